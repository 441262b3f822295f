use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One labeled figure inside a metric grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Metric {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// One row in a badge list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeItem {
    pub label: String,
    pub badge: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
}

/// The fixed set of presentation primitives the UI knows how to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderSpec {
    MetricGrid {
        metrics: Vec<Metric>,
    },
    EntityCard {
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        fields: Vec<(String, String)>,
    },
    ListWithBadges {
        items: Vec<BadgeItem>,
    },
    AlertBanner {
        severity: AlertSeverity,
        message: String,
    },
    /// Fallback for outputs no mapper recognizes.
    RawPayload {
        json: Value,
    },
}

impl RenderSpec {
    pub fn raw(json: Value) -> Self {
        RenderSpec::RawPayload { json }
    }

    pub fn alert(severity: AlertSeverity, message: impl Into<String>) -> Self {
        RenderSpec::AlertBanner {
            severity,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_spec_tagged_serialization() {
        let spec = RenderSpec::MetricGrid {
            metrics: vec![Metric::new("Immobilien", "3")],
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "metric_grid");
        assert_eq!(json["metrics"][0]["label"], "Immobilien");
    }

    #[test]
    fn test_alert_severity_lowercase() {
        let spec = RenderSpec::alert(AlertSeverity::Warning, "Achtung");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["severity"], "warning");
    }
}
