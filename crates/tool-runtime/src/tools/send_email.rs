use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use immo_core::{ActionKind, ActivityEntry};
use immo_notify::Mailer;

use crate::tool::{parse_input, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::{admin_required, record_activity};

/// Send an email through the configured mail transport. Admin only,
/// requires approval. There is no idempotency key; the approval step
/// is the only guard against duplicate delivery.
pub struct SendEmailTool;

#[derive(Debug, Deserialize)]
struct SendEmailInput {
    recipient: String,
    subject: String,
    body: String,
}

#[async_trait]
impl Tool for SendEmailTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "send_email".to_string(),
            description: "Send an email to a client or external recipient.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "recipient": {
                        "type": "string",
                        "description": "Destination email address"
                    },
                    "subject": {
                        "type": "string",
                        "description": "Subject line"
                    },
                    "body": {
                        "type": "string",
                        "description": "Plain-text message body"
                    }
                },
                "required": ["recipient", "subject", "body"]
            }),
            needs_approval: true,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        if let Some(denied) = admin_required(context) {
            return Ok(denied);
        }
        let input: SendEmailInput = parse_input(input)?;
        debug!(
            principal = %context.principal.id,
            recipient = %input.recipient,
            "send_email"
        );

        if let Err(e) = context
            .mailer
            .send(&input.recipient, &input.subject, &input.body)
            .await
        {
            return Ok(ToolResult::failure(format!("E-Mail-Versand fehlgeschlagen: {e}")));
        }

        record_activity(
            context,
            ActivityEntry::new(
                &context.principal.id,
                ActionKind::EmailSent,
                "email",
                &input.recipient,
                serde_json::json!({ "subject": input.subject }),
            ),
        )
        .await;

        ToolResult::success(&serde_json::json!({
            "success": true,
            "recipient": input.recipient,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::memory_context;
    use immo_core::Principal;

    #[tokio::test]
    async fn test_email_delivered_and_audited() {
        let (ctx, store, mailer) = memory_context(Principal::admin("A1"));

        let result = SendEmailTool
            .execute(
                serde_json::json!({
                    "recipient": "anna@example.de",
                    "subject": "Ihr Portfolio-Bericht",
                    "body": "Anbei der aktuelle Bericht."
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!result.is_error);

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "anna@example.de");

        let activity = store.all_activity().await;
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].action, ActionKind::EmailSent);
        assert_eq!(activity[0].entity_id, "anna@example.de");
    }

    #[tokio::test]
    async fn test_standard_scope_sends_nothing() {
        let (ctx, store, mailer) = memory_context(Principal::standard("U1"));

        let result = SendEmailTool
            .execute(
                serde_json::json!({
                    "recipient": "anna@example.de",
                    "subject": "Test",
                    "body": "Test"
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(mailer.sent().await.is_empty());
        assert!(store.all_activity().await.is_empty());
    }
}
