use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a client record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Prospect,
    Active,
    Inactive,
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientStatus::Prospect => write!(f, "prospect"),
            ClientStatus::Active => write!(f, "active"),
            ClientStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for ClientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prospect" => Ok(ClientStatus::Prospect),
            "active" => Ok(ClientStatus::Active),
            "inactive" => Ok(ClientStatus::Inactive),
            other => Err(format!(
                "unknown client status '{other}', expected one of: prospect, active, inactive"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: ClientStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub owner_id: String,
    pub address: String,
    pub purchase_price: f64,
    pub current_value: f64,
    /// Monthly cold rent in EUR.
    pub rental_income: f64,
    pub size_sqm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Valuation {
    pub property_id: String,
    pub value: f64,
    pub valued_at: DateTime<Utc>,
}

/// Status of an investment offer sent to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub client_id: String,
    pub property_description: String,
    pub asking_price: f64,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    /// Key into the blob store.
    pub blob_key: String,
    pub media_type: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// A chat message persisted to the advisor inbox (distinct from the
/// assistant conversation itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Kind of audited mutation. Serialized as the dotted action name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "client.status_changed")]
    ClientStatusChanged,
    #[serde(rename = "message.sent")]
    MessageSent,
    #[serde(rename = "notification.created")]
    NotificationCreated,
    #[serde(rename = "email.sent")]
    EmailSent,
    #[serde(rename = "document.saved")]
    DocumentSaved,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ClientStatusChanged => "client.status_changed",
            ActionKind::MessageSent => "message.sent",
            ActionKind::NotificationCreated => "notification.created",
            ActionKind::EmailSent => "email.sent",
            ActionKind::DocumentSaved => "document.saved",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable audit record appended after every successful mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub actor_id: String,
    pub action: ActionKind,
    pub entity_type: String,
    pub entity_id: String,
    pub detail: Value,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        actor_id: impl Into<String>,
        action: ActionKind,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        detail: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            actor_id: actor_id.into(),
            action,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            detail,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_status_parse() {
        assert_eq!("active".parse::<ClientStatus>().unwrap(), ClientStatus::Active);
        assert!("vip".parse::<ClientStatus>().is_err());
    }

    #[test]
    fn test_action_kind_serializes_dotted() {
        let json = serde_json::to_string(&ActionKind::ClientStatusChanged).unwrap();
        assert_eq!(json, "\"client.status_changed\"");
    }

    #[test]
    fn test_activity_entry_roundtrip() {
        let entry = ActivityEntry::new(
            "A1",
            ActionKind::EmailSent,
            "email",
            "kunde@example.com",
            serde_json::json!({"subject": "Hallo"}),
        );
        let json = serde_json::to_string(&entry).unwrap();
        let back: ActivityEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, ActionKind::EmailSent);
        assert_eq!(back.entity_id, "kunde@example.com");
    }
}
