use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use immo_core::DataStore;

use crate::tool::{parse_input, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// Search the caller's documents by title.
pub struct DocumentSearchTool;

#[derive(Debug, Deserialize)]
struct DocumentSearchInput {
    #[serde(default)]
    query: String,
}

#[async_trait]
impl Tool for DocumentSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "document_search".to_string(),
            description: "Search the caller's documents by title. Returns at most 20 matches \
                          with id, title, media type, and upload date."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Title substring to search for; empty lists all documents"
                    }
                }
            }),
            needs_approval: false,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: DocumentSearchInput = parse_input(input)?;
        debug!(principal = %context.principal.id, query = %input.query, "document_search");

        let documents = match context
            .store
            .search_documents(&context.principal.id, &input.query)
            .await
        {
            Ok(d) => d,
            Err(e) => return Ok(ToolResult::failure(format!("Datenbankfehler: {e}"))),
        };

        let items: Vec<Value> = documents
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "title": d.title,
                    "mediaType": d.media_type,
                    "uploadedAt": d.uploaded_at,
                })
            })
            .collect();

        ToolResult::success(&serde_json::json!({
            "count": items.len(),
            "documents": items,
        }))
    }
}
