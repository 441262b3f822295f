use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use immo_core::{ActionKind, ActivityEntry, DataStore, Notification};

use crate::tool::{parse_input, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::{admin_required, record_activity};

/// Create an in-portal notification for a client. Admin only, requires approval.
pub struct NotificationCreateTool;

#[derive(Debug, Deserialize)]
struct NotificationCreateInput {
    #[serde(rename = "recipientId")]
    recipient_id: String,
    title: String,
    body: String,
}

#[async_trait]
impl Tool for NotificationCreateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "notification_create".to_string(),
            description: "Create an in-portal notification for a client.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "recipientId": {
                        "type": "string",
                        "description": "Client to notify"
                    },
                    "title": {
                        "type": "string",
                        "description": "Notification headline"
                    },
                    "body": {
                        "type": "string",
                        "description": "Notification text"
                    }
                },
                "required": ["recipientId", "title", "body"]
            }),
            needs_approval: true,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        if let Some(denied) = admin_required(context) {
            return Ok(denied);
        }
        let input: NotificationCreateInput = parse_input(input)?;
        debug!(
            principal = %context.principal.id,
            recipient = %input.recipient_id,
            "notification_create"
        );

        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: input.recipient_id.clone(),
            title: input.title,
            body: input.body,
            created_at: Utc::now(),
            read: false,
        };
        let notification_id = notification.id.clone();

        if let Err(e) = context.store.insert_notification(notification).await {
            return Ok(ToolResult::failure(format!("Datenbankfehler: {e}")));
        }

        record_activity(
            context,
            ActivityEntry::new(
                &context.principal.id,
                ActionKind::NotificationCreated,
                "notification",
                &notification_id,
                serde_json::json!({ "recipientId": input.recipient_id }),
            ),
        )
        .await;

        ToolResult::success(&serde_json::json!({
            "success": true,
            "notificationId": notification_id,
            "recipientId": input.recipient_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::memory_context;
    use immo_core::Principal;

    #[tokio::test]
    async fn test_notification_created_unread() {
        let (ctx, store, _) = memory_context(Principal::admin("A1"));

        let result = NotificationCreateTool
            .execute(
                serde_json::json!({
                    "recipientId": "U1",
                    "title": "Neue Bewertung",
                    "body": "Ihre Immobilie wurde neu bewertet."
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!result.is_error);

        let inbox = store.notifications_for("U1").await;
        assert_eq!(inbox.len(), 1);
        assert!(!inbox[0].read);

        let activity = store.all_activity().await;
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].action, ActionKind::NotificationCreated);
    }

    #[tokio::test]
    async fn test_standard_scope_is_denied() {
        let (ctx, store, _) = memory_context(Principal::standard("U1"));

        let result = NotificationCreateTool
            .execute(
                serde_json::json!({
                    "recipientId": "U2",
                    "title": "Hallo",
                    "body": "Test"
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(store.notifications_for("U2").await.is_empty());
    }
}
