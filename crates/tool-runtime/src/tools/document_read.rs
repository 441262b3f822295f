use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use immo_core::DataStore;
use immo_storage::BlobStore;

use crate::tool::{parse_input, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// Resolve one of the caller's documents to a retrieval URL.
pub struct DocumentReadTool;

#[derive(Debug, Deserialize)]
struct DocumentReadInput {
    #[serde(rename = "documentId")]
    document_id: String,
}

#[async_trait]
impl Tool for DocumentReadTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "document_read".to_string(),
            description: "Fetch a retrieval URL for one of the caller's documents."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "documentId": {
                        "type": "string",
                        "description": "Id of the document to read"
                    }
                },
                "required": ["documentId"]
            }),
            needs_approval: false,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: DocumentReadInput = parse_input(input)?;
        debug!(principal = %context.principal.id, document_id = %input.document_id, "document_read");

        let document = match context.store.document(&input.document_id).await {
            Ok(d) => d,
            Err(e) => return Ok(ToolResult::failure(format!("Datenbankfehler: {e}"))),
        };

        // A missing document and a foreign one answer identically, so
        // the tool leaks no information about other principals' files.
        let accessible = document
            .as_ref()
            .map(|d| d.owner_id == context.principal.id || context.principal.is_admin())
            .unwrap_or(false);
        let Some(document) = document.filter(|_| accessible) else {
            return Ok(ToolResult::failure(
                "Dokument nicht gefunden oder kein Zugriff",
            ));
        };

        let url = match context.blobs.signed_url(&document.blob_key).await {
            Ok(u) => u,
            Err(e) => return Ok(ToolResult::failure(format!("Speicherfehler: {e}"))),
        };

        ToolResult::success(&serde_json::json!({
            "success": true,
            "document": {
                "id": document.id,
                "title": document.title,
                "mediaType": document.media_type,
            },
            "url": url,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::memory_context;
    use bytes::Bytes;
    use chrono::Utc;
    use immo_core::{DocumentMeta, Principal};

    async fn seed_doc(
        ctx: &ToolContext,
        store: &immo_core::MemoryStore,
        id: &str,
        owner: &str,
    ) {
        let blob_key = format!("documents/{owner}/{id}");
        ctx.blobs
            .put(&blob_key, Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();
        store
            .seed_document(DocumentMeta {
                id: id.into(),
                owner_id: owner.into(),
                title: "Mietvertrag".into(),
                blob_key,
                media_type: "application/pdf".into(),
                uploaded_at: Utc::now(),
            })
            .await;
    }

    #[tokio::test]
    async fn test_owner_gets_url() {
        let (ctx, store, _) = memory_context(Principal::standard("U1"));
        seed_doc(&ctx, &store, "D1", "U1").await;

        let result = DocumentReadTool
            .execute(serde_json::json!({"documentId": "D1"}), &ctx)
            .await
            .unwrap();
        assert!(!result.is_error);
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["url"], "memory://documents/U1/D1");
    }

    #[tokio::test]
    async fn test_foreign_document_denied() {
        let (ctx, store, _) = memory_context(Principal::standard("U1"));
        seed_doc(&ctx, &store, "D2", "U2").await;

        let result = DocumentReadTool
            .execute(serde_json::json!({"documentId": "D2"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_admin_reads_any_document() {
        let (ctx, store, _) = memory_context(Principal::admin("A1"));
        seed_doc(&ctx, &store, "D2", "U2").await;

        let result = DocumentReadTool
            .execute(serde_json::json!({"documentId": "D2"}), &ctx)
            .await
            .unwrap();
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_missing_document_id_is_invalid_input() {
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let err = DocumentReadTool
            .execute(serde_json::json!({}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
