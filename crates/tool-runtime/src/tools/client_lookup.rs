use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use immo_core::DataStore;

use crate::tool::{parse_input, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::admin_required;

/// Search clients by name or email. Admin only.
pub struct ClientLookupTool;

#[derive(Debug, Deserialize)]
struct ClientLookupInput {
    #[serde(default)]
    query: String,
}

#[async_trait]
impl Tool for ClientLookupTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "client_lookup".to_string(),
            description: "Search clients by name or email. Returns at most 20 matches with \
                          id, name, email, and status."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Name or email substring; empty lists all clients"
                    }
                }
            }),
            needs_approval: false,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        if let Some(denied) = admin_required(context) {
            return Ok(denied);
        }
        let input: ClientLookupInput = parse_input(input)?;
        debug!(principal = %context.principal.id, query = %input.query, "client_lookup");

        let clients = match context.store.search_clients(&input.query).await {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::failure(format!("Datenbankfehler: {e}"))),
        };

        let items: Vec<Value> = clients
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "name": c.name,
                    "email": c.email,
                    "status": c.status,
                })
            })
            .collect();

        ToolResult::success(&serde_json::json!({
            "count": items.len(),
            "clients": items,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::memory_context;
    use chrono::Utc;
    use immo_core::{Client, ClientStatus, Principal};

    fn client(id: &str, name: &str) -> Client {
        Client {
            id: id.into(),
            name: name.into(),
            email: format!("{}@example.de", id.to_lowercase()),
            status: ClientStatus::Active,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_admin_matches_by_name() {
        let (ctx, store, _) = memory_context(Principal::admin("A1"));
        store.seed_client(client("U1", "Anna Weber")).await;
        store.seed_client(client("U2", "Jonas Becker")).await;

        let result = ClientLookupTool
            .execute(serde_json::json!({"query": "weber"}), &ctx)
            .await
            .unwrap();
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["clients"][0]["id"], "U1");
    }

    #[tokio::test]
    async fn test_standard_scope_is_denied() {
        let (ctx, store, _) = memory_context(Principal::standard("U1"));
        store.seed_client(client("U1", "Anna Weber")).await;

        let result = ClientLookupTool
            .execute(serde_json::json!({"query": "weber"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error);
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["success"], false);
    }
}
