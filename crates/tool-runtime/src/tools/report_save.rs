use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use immo_core::{ActionKind, ActivityEntry, DataStore, DocumentMeta};
use immo_storage::BlobStore;

use crate::tool::{parse_input, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::{admin_required, record_activity};

/// Persist a generated report into blob storage and register its
/// document metadata for the owner. Admin only, requires approval.
pub struct ReportSaveTool;

#[derive(Debug, Deserialize)]
struct ReportSaveInput {
    title: String,
    content: String,
    #[serde(rename = "ownerId")]
    owner_id: String,
}

#[async_trait]
impl Tool for ReportSaveTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "report_save".to_string(),
            description: "Save a generated markdown report as a document in a client's \
                          document area."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Document title"
                    },
                    "content": {
                        "type": "string",
                        "description": "Markdown report body"
                    },
                    "ownerId": {
                        "type": "string",
                        "description": "Client the document belongs to"
                    }
                },
                "required": ["title", "content", "ownerId"]
            }),
            needs_approval: true,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        if let Some(denied) = admin_required(context) {
            return Ok(denied);
        }
        let input: ReportSaveInput = parse_input(input)?;
        debug!(
            principal = %context.principal.id,
            owner = %input.owner_id,
            title = %input.title,
            "report_save"
        );

        let document_id = Uuid::new_v4().to_string();
        let blob_key = format!("documents/{}/{}", input.owner_id, document_id);

        if let Err(e) = context
            .blobs
            .put(&blob_key, Bytes::from(input.content))
            .await
        {
            return Ok(ToolResult::failure(format!("Speicherfehler: {e}")));
        }

        let doc = DocumentMeta {
            id: document_id.clone(),
            owner_id: input.owner_id.clone(),
            title: input.title.clone(),
            blob_key,
            media_type: "text/markdown".to_string(),
            uploaded_at: Utc::now(),
        };
        if let Err(e) = context.store.insert_document(doc).await {
            return Ok(ToolResult::failure(format!("Datenbankfehler: {e}")));
        }

        record_activity(
            context,
            ActivityEntry::new(
                &context.principal.id,
                ActionKind::DocumentSaved,
                "document",
                &document_id,
                serde_json::json!({ "ownerId": input.owner_id, "title": input.title }),
            ),
        )
        .await;

        ToolResult::success(&serde_json::json!({
            "success": true,
            "documentId": document_id,
            "ownerId": input.owner_id,
        }))
    }
}
