use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use immo_core::DataStore;

use crate::tool::{parse_input, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// List the caller's properties, or fetch one with its latest valuation.
pub struct PropertyLookupTool;

#[derive(Debug, Deserialize)]
struct PropertyLookupInput {
    #[serde(rename = "propertyId")]
    property_id: Option<String>,
}

#[async_trait]
impl Tool for PropertyLookupTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "property_lookup".to_string(),
            description: "Look up the caller's properties. Without propertyId, lists all owned \
                          properties; with propertyId, returns that property including its most \
                          recent valuation."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "propertyId": {
                        "type": "string",
                        "description": "Optional property id for a detail lookup"
                    }
                }
            }),
            needs_approval: false,
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let input: PropertyLookupInput = parse_input(input)?;
        debug!(principal = %context.principal.id, property_id = ?input.property_id, "property_lookup");

        let properties = match context.store.properties_for(&context.principal.id).await {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::failure(format!("Datenbankfehler: {e}"))),
        };

        match input.property_id {
            Some(id) => {
                // Ownership is enforced by querying only the caller's
                // properties; a foreign id looks identical to a missing one.
                let Some(property) = properties.into_iter().find(|p| p.id == id) else {
                    return Ok(ToolResult::failure("Immobilie nicht gefunden"));
                };
                let latest_valuation = context
                    .store
                    .valuations_for(&property.id)
                    .await
                    .ok()
                    .and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0)) });

                ToolResult::success(&serde_json::json!({
                    "property": property,
                    "latestValuation": latest_valuation,
                }))
            }
            None => ToolResult::success(&serde_json::json!({
                "count": properties.len(),
                "properties": properties,
            })),
        }
    }
}
