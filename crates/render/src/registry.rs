use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::primitives::{AlertSeverity, BadgeItem, Metric, RenderSpec};

/// Reshapes one tool's successful output into a primitive. Returning
/// `None` means the payload did not match the expected shape and the
/// caller falls back to the raw view.
pub type ToolOutputMapper = fn(&Value) -> Option<RenderSpec>;

/// Tool name → presentation mapping. Lookup misses and shape drift
/// degrade to [`RenderSpec::RawPayload`]; error payloads become an
/// [`RenderSpec::AlertBanner`]. Nothing here ever panics.
pub struct RenderRegistry {
    mappers: HashMap<String, ToolOutputMapper>,
}

impl RenderRegistry {
    pub fn new() -> Self {
        Self {
            mappers: HashMap::new(),
        }
    }

    /// Registry covering every portal tool.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("portfolio_summary", map_portfolio_summary);
        registry.register("property_lookup", map_property_lookup);
        registry.register("document_search", map_document_search);
        registry.register("document_read", map_document_read);
        registry.register("offer_list", map_offer_list);
        registry.register("client_lookup", map_client_lookup);
        registry.register("client_status_change", map_status_change);
        registry.register("send_message", map_confirmation);
        registry.register("send_email", map_confirmation);
        registry.register("notification_create", map_confirmation);
        registry.register("report_save", map_confirmation);
        registry
    }

    pub fn register(&mut self, tool_name: impl Into<String>, mapper: ToolOutputMapper) {
        self.mappers.insert(tool_name.into(), mapper);
    }

    /// Map one resolved tool output to a primitive. `is_error` marks
    /// payloads from the tool-error channel.
    pub fn render(&self, tool_name: &str, output: &Value, is_error: bool) -> RenderSpec {
        if is_error {
            let message = output
                .get("error")
                .or_else(|| output.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Aktion fehlgeschlagen");
            return RenderSpec::alert(AlertSeverity::Error, message);
        }
        match self.mappers.get(tool_name) {
            Some(mapper) => mapper(output).unwrap_or_else(|| {
                debug!(tool = tool_name, "tool output did not match render shape");
                RenderSpec::raw(output.clone())
            }),
            None => {
                debug!(tool = tool_name, "no render mapping registered");
                RenderSpec::raw(output.clone())
            }
        }
    }
}

impl Default for RenderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn eur(value: f64) -> String {
    format!("{value:.0} €")
}

fn map_portfolio_summary(output: &Value) -> Option<RenderSpec> {
    if output.get("summary").map(Value::is_null) == Some(true) {
        let message = output.get("message").and_then(Value::as_str)?;
        return Some(RenderSpec::alert(AlertSeverity::Info, message));
    }
    let summary = output.get("summary")?;
    let mut metrics = vec![
        Metric::new(
            "Immobilien",
            summary.get("propertyCount")?.as_u64()?.to_string(),
        ),
        Metric::new("Gesamtwert", eur(summary.get("totalValue")?.as_f64()?)),
        Metric::new(
            "Mieteinnahmen / Monat",
            eur(summary.get("monthlyRentalIncome")?.as_f64()?),
        ),
    ];
    if let Some(yield_pct) = summary.get("grossYieldPercent").and_then(Value::as_f64) {
        metrics.push(Metric::new("Bruttorendite", format!("{yield_pct:.1} %")));
    }
    Some(RenderSpec::MetricGrid { metrics })
}

fn map_property_lookup(output: &Value) -> Option<RenderSpec> {
    if let Some(property) = output.get("property") {
        let mut fields = vec![
            (
                "Kaufpreis".to_string(),
                eur(property.get("purchase_price")?.as_f64()?),
            ),
            (
                "Aktueller Wert".to_string(),
                eur(property.get("current_value")?.as_f64()?),
            ),
            (
                "Miete / Monat".to_string(),
                eur(property.get("rental_income")?.as_f64()?),
            ),
            (
                "Fläche".to_string(),
                format!("{:.0} m²", property.get("size_sqm")?.as_f64()?),
            ),
        ];
        if let Some(valuation) = output.get("latestValuation").filter(|v| !v.is_null()) {
            fields.push((
                "Letzte Bewertung".to_string(),
                eur(valuation.get("value")?.as_f64()?),
            ));
        }
        return Some(RenderSpec::EntityCard {
            title: property.get("address")?.as_str()?.to_string(),
            subtitle: None,
            fields,
        });
    }
    let properties = output.get("properties")?.as_array()?;
    let items = properties
        .iter()
        .map(|p| {
            Some(BadgeItem {
                label: p.get("address")?.as_str()?.to_string(),
                badge: eur(p.get("current_value")?.as_f64()?),
                detail: None,
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(RenderSpec::ListWithBadges { items })
}

fn map_document_search(output: &Value) -> Option<RenderSpec> {
    let documents = output.get("documents")?.as_array()?;
    let items = documents
        .iter()
        .map(|d| {
            Some(BadgeItem {
                label: d.get("title")?.as_str()?.to_string(),
                badge: d.get("mediaType")?.as_str()?.to_string(),
                detail: d.get("id").and_then(Value::as_str).map(String::from),
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(RenderSpec::ListWithBadges { items })
}

fn map_document_read(output: &Value) -> Option<RenderSpec> {
    let document = output.get("document")?;
    Some(RenderSpec::EntityCard {
        title: document.get("title")?.as_str()?.to_string(),
        subtitle: Some(document.get("mediaType")?.as_str()?.to_string()),
        fields: vec![("URL".to_string(), output.get("url")?.as_str()?.to_string())],
    })
}

fn map_offer_list(output: &Value) -> Option<RenderSpec> {
    if let Some(message) = output.get("message").and_then(Value::as_str) {
        return Some(RenderSpec::alert(AlertSeverity::Info, message));
    }
    let offers = output.get("offers")?.as_array()?;
    let items = offers
        .iter()
        .map(|o| {
            Some(BadgeItem {
                label: o.get("propertyDescription")?.as_str()?.to_string(),
                badge: o.get("status")?.as_str()?.to_string(),
                detail: Some(eur(o.get("askingPrice")?.as_f64()?)),
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(RenderSpec::ListWithBadges { items })
}

fn map_client_lookup(output: &Value) -> Option<RenderSpec> {
    let clients = output.get("clients")?.as_array()?;
    let items = clients
        .iter()
        .map(|c| {
            Some(BadgeItem {
                label: c.get("name")?.as_str()?.to_string(),
                badge: c.get("status")?.as_str()?.to_string(),
                detail: c.get("email").and_then(Value::as_str).map(String::from),
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(RenderSpec::ListWithBadges { items })
}

fn map_status_change(output: &Value) -> Option<RenderSpec> {
    Some(RenderSpec::EntityCard {
        title: format!("Status geändert: {}", output.get("userId")?.as_str()?),
        subtitle: None,
        fields: vec![
            (
                "Vorher".to_string(),
                output.get("oldStatus")?.as_str()?.to_string(),
            ),
            (
                "Nachher".to_string(),
                output.get("newStatus")?.as_str()?.to_string(),
            ),
        ],
    })
}

/// Mutating tools whose success payload only confirms the action.
fn map_confirmation(output: &Value) -> Option<RenderSpec> {
    if output.get("success")?.as_bool()? {
        Some(RenderSpec::alert(
            AlertSeverity::Info,
            "Aktion erfolgreich ausgeführt",
        ))
    } else {
        None
    }
}
