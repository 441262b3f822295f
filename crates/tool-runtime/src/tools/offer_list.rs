use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use immo_core::DataStore;

use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// List the offers addressed to the caller.
pub struct OfferListTool;

#[async_trait]
impl Tool for OfferListTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "offer_list".to_string(),
            description: "List the purchase offers prepared for the caller, with asking \
                          price and status."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            needs_approval: false,
        }
    }

    async fn execute(&self, _input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        debug!(principal = %context.principal.id, "offer_list");

        let offers = match context.store.offers_for(&context.principal.id).await {
            Ok(o) => o,
            Err(e) => return Ok(ToolResult::failure(format!("Datenbankfehler: {e}"))),
        };

        if offers.is_empty() {
            return ToolResult::success(&serde_json::json!({
                "count": 0,
                "offers": [],
                "message": "Keine Angebote vorhanden",
            }));
        }

        let items: Vec<Value> = offers
            .iter()
            .map(|o| {
                serde_json::json!({
                    "id": o.id,
                    "propertyDescription": o.property_description,
                    "askingPrice": o.asking_price,
                    "status": o.status,
                    "createdAt": o.created_at,
                })
            })
            .collect();

        ToolResult::success(&serde_json::json!({
            "count": items.len(),
            "offers": items,
        }))
    }
}
