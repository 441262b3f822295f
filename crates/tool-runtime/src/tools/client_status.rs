use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use immo_core::{ActionKind, ActivityEntry, ClientStatus, DataStore, StoreError};

use crate::tool::{parse_input, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::{admin_required, record_activity};

/// Change a client's lifecycle status. Admin only, requires approval.
pub struct ClientStatusTool;

#[derive(Debug, Deserialize)]
struct ClientStatusInput {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "newStatus")]
    new_status: String,
}

#[async_trait]
impl Tool for ClientStatusTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "client_status_change".to_string(),
            description: "Change a client's status to prospect, active, or inactive."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "userId": {
                        "type": "string",
                        "description": "Client id"
                    },
                    "newStatus": {
                        "type": "string",
                        "enum": ["prospect", "active", "inactive"],
                        "description": "Status to set"
                    }
                },
                "required": ["userId", "newStatus"]
            }),
            needs_approval: true,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        if let Some(denied) = admin_required(context) {
            return Ok(denied);
        }
        let input: ClientStatusInput = parse_input(input)?;
        debug!(
            principal = %context.principal.id,
            user_id = %input.user_id,
            new_status = %input.new_status,
            "client_status_change"
        );

        let new_status: ClientStatus = match input.new_status.parse() {
            Ok(s) => s,
            Err(_) => {
                return Ok(ToolResult::failure(format!(
                    "Ungültiger Status: {}",
                    input.new_status
                )))
            }
        };

        let old_status = match context
            .store
            .update_client_status(&input.user_id, new_status)
            .await
        {
            Ok(old) => old,
            Err(StoreError::NotFound { .. }) => {
                return Ok(ToolResult::failure("Kunde nicht gefunden"))
            }
            Err(e) => return Ok(ToolResult::failure(format!("Datenbankfehler: {e}"))),
        };

        record_activity(
            context,
            ActivityEntry::new(
                &context.principal.id,
                ActionKind::ClientStatusChanged,
                "client",
                &input.user_id,
                serde_json::json!({ "old": old_status, "new": new_status }),
            ),
        )
        .await;

        ToolResult::success(&serde_json::json!({
            "success": true,
            "userId": input.user_id,
            "oldStatus": old_status,
            "newStatus": new_status,
        }))
    }
}
