use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use immo_core::DataStore;

use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// Aggregate the caller's property portfolio into a compact summary.
pub struct PortfolioSummaryTool;

#[async_trait]
impl Tool for PortfolioSummaryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "portfolio_summary".to_string(),
            description: "Summarize the caller's property portfolio: number of properties, \
                          total current value, monthly rental income, and gross yield."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            needs_approval: false,
        }
    }

    async fn execute(&self, _input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        debug!(principal = %context.principal.id, "portfolio_summary");

        let properties = match context.store.properties_for(&context.principal.id).await {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::failure(format!("Datenbankfehler: {e}"))),
        };

        if properties.is_empty() {
            return ToolResult::success(&serde_json::json!({
                "summary": null,
                "message": "Keine Immobilien im Portfolio",
            }));
        }

        let total_value: f64 = properties.iter().map(|p| p.current_value).sum();
        let total_purchase: f64 = properties.iter().map(|p| p.purchase_price).sum();
        let monthly_rent: f64 = properties.iter().map(|p| p.rental_income).sum();
        // Guarded above: at least one property, but value can still be zero.
        let gross_yield = if total_value > 0.0 {
            Some(monthly_rent * 12.0 / total_value * 100.0)
        } else {
            None
        };

        ToolResult::success(&serde_json::json!({
            "summary": {
                "propertyCount": properties.len(),
                "totalValue": total_value,
                "totalPurchasePrice": total_purchase,
                "monthlyRentalIncome": monthly_rent,
                "grossYieldPercent": gross_yield,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::memory_context;
    use immo_core::{Principal, Property};

    #[tokio::test]
    async fn test_empty_portfolio_boundary_case() {
        let (ctx, _, _) = memory_context(Principal::standard("U1"));
        let result = PortfolioSummaryTool
            .execute(serde_json::json!({}), &ctx)
            .await
            .unwrap();

        assert!(!result.is_error);
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert!(payload["summary"].is_null());
        assert_eq!(payload["message"], "Keine Immobilien im Portfolio");
    }

    #[tokio::test]
    async fn test_summary_with_properties() {
        let (ctx, store, _) = memory_context(Principal::standard("U1"));
        store
            .seed_property(Property {
                id: "P1".into(),
                owner_id: "U1".into(),
                address: "Hauptstraße 1, Berlin".into(),
                purchase_price: 300_000.0,
                current_value: 400_000.0,
                rental_income: 1_000.0,
                size_sqm: 80.0,
            })
            .await;
        store
            .seed_property(Property {
                id: "P2".into(),
                owner_id: "U1".into(),
                address: "Ringstraße 5, Hamburg".into(),
                purchase_price: 150_000.0,
                current_value: 200_000.0,
                rental_income: 500.0,
                size_sqm: 50.0,
            })
            .await;

        let result = PortfolioSummaryTool
            .execute(serde_json::json!({}), &ctx)
            .await
            .unwrap();
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        let summary = &payload["summary"];
        assert_eq!(summary["propertyCount"], 2);
        assert_eq!(summary["totalValue"], 600_000.0);
        assert_eq!(summary["monthlyRentalIncome"], 1_500.0);
        assert_eq!(summary["grossYieldPercent"], 3.0);
    }

    #[tokio::test]
    async fn test_only_own_properties_counted() {
        let (ctx, store, _) = memory_context(Principal::standard("U1"));
        store
            .seed_property(Property {
                id: "P9".into(),
                owner_id: "U2".into(),
                address: "Fremdstraße 9, München".into(),
                purchase_price: 500_000.0,
                current_value: 550_000.0,
                rental_income: 1_800.0,
                size_sqm: 95.0,
            })
            .await;

        let result = PortfolioSummaryTool
            .execute(serde_json::json!({}), &ctx)
            .await
            .unwrap();
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["message"], "Keine Immobilien im Portfolio");
    }
}
