use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use immo_core::{ActionKind, ActivityEntry, ChatMessageRecord, DataStore};

use crate::tool::{parse_input, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::record_activity;

/// Persist a chat message to the advisor inbox. Requires approval.
pub struct SendMessageTool;

#[derive(Debug, Deserialize)]
struct SendMessageInput {
    #[serde(rename = "recipientId")]
    recipient_id: String,
    body: String,
}

#[async_trait]
impl Tool for SendMessageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "send_message".to_string(),
            description: "Send a chat message to an advisor or client inbox on behalf of \
                          the caller."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "recipientId": {
                        "type": "string",
                        "description": "Inbox owner to deliver the message to"
                    },
                    "body": {
                        "type": "string",
                        "description": "Message text"
                    }
                },
                "required": ["recipientId", "body"]
            }),
            needs_approval: true,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: SendMessageInput = parse_input(input)?;
        debug!(
            principal = %context.principal.id,
            recipient = %input.recipient_id,
            "send_message"
        );

        if input.body.trim().is_empty() {
            return Ok(ToolResult::failure("Nachrichtentext darf nicht leer sein"));
        }

        let message = ChatMessageRecord {
            id: Uuid::new_v4().to_string(),
            sender_id: context.principal.id.clone(),
            recipient_id: input.recipient_id.clone(),
            body: input.body,
            sent_at: Utc::now(),
        };
        let message_id = message.id.clone();

        if let Err(e) = context.store.insert_chat_message(message).await {
            return Ok(ToolResult::failure(format!("Datenbankfehler: {e}")));
        }

        record_activity(
            context,
            ActivityEntry::new(
                &context.principal.id,
                ActionKind::MessageSent,
                "message",
                &message_id,
                serde_json::json!({ "recipientId": input.recipient_id }),
            ),
        )
        .await;

        ToolResult::success(&serde_json::json!({
            "success": true,
            "messageId": message_id,
            "recipientId": input.recipient_id,
        }))
    }
}
