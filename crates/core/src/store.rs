//! Data-store boundary.
//!
//! The relational store behind the portal is an external collaborator;
//! tool executors only see this trait. Every list operation returns a
//! bounded page so tool payloads stay small enough for a conversation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::entity::{
    ActivityEntry, ChatMessageRecord, Client, ClientStatus, DocumentMeta, Notification, Offer,
    Property, Valuation,
};
use crate::error::StoreError;

/// Hard cap on list results returned by any store query.
pub const MAX_PAGE: usize = 20;

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn client(&self, id: &str) -> Result<Option<Client>, StoreError>;

    /// Cross-principal client search (admin tools only). Empty query
    /// matches everything; results are capped at [`MAX_PAGE`].
    async fn search_clients(&self, query: &str) -> Result<Vec<Client>, StoreError>;

    /// Set a client's status, returning the previous status.
    async fn update_client_status(
        &self,
        id: &str,
        status: ClientStatus,
    ) -> Result<ClientStatus, StoreError>;

    async fn properties_for(&self, owner_id: &str) -> Result<Vec<Property>, StoreError>;

    async fn valuations_for(&self, property_id: &str) -> Result<Vec<Valuation>, StoreError>;

    async fn offers_for(&self, client_id: &str) -> Result<Vec<Offer>, StoreError>;

    async fn search_documents(
        &self,
        owner_id: &str,
        query: &str,
    ) -> Result<Vec<DocumentMeta>, StoreError>;

    async fn document(&self, id: &str) -> Result<Option<DocumentMeta>, StoreError>;

    async fn insert_document(&self, doc: DocumentMeta) -> Result<(), StoreError>;

    async fn insert_notification(&self, notification: Notification) -> Result<(), StoreError>;

    async fn insert_chat_message(&self, message: ChatMessageRecord) -> Result<(), StoreError>;

    /// Append-only audit log. Entries are never updated or deleted.
    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError>;

    async fn activities_for_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<ActivityEntry>, StoreError>;
}

/// In-memory store for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    clients: RwLock<HashMap<String, Client>>,
    properties: RwLock<Vec<Property>>,
    valuations: RwLock<Vec<Valuation>>,
    offers: RwLock<Vec<Offer>>,
    documents: RwLock<HashMap<String, DocumentMeta>>,
    notifications: RwLock<Vec<Notification>>,
    chat_messages: RwLock<Vec<ChatMessageRecord>>,
    activity: RwLock<Vec<ActivityEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_client(&self, client: Client) {
        self.clients.write().await.insert(client.id.clone(), client);
    }

    pub async fn seed_property(&self, property: Property) {
        self.properties.write().await.push(property);
    }

    pub async fn seed_valuation(&self, valuation: Valuation) {
        self.valuations.write().await.push(valuation);
    }

    pub async fn seed_offer(&self, offer: Offer) {
        self.offers.write().await.push(offer);
    }

    pub async fn seed_document(&self, doc: DocumentMeta) {
        self.documents.write().await.insert(doc.id.clone(), doc);
    }

    /// All notifications for a recipient (test inspection).
    pub async fn notifications_for(&self, recipient_id: &str) -> Vec<Notification> {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    /// All persisted chat messages for a recipient (test inspection).
    pub async fn chat_messages_for(&self, recipient_id: &str) -> Vec<ChatMessageRecord> {
        self.chat_messages
            .read()
            .await
            .iter()
            .filter(|m| m.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    /// Full audit log (test inspection).
    pub async fn all_activity(&self) -> Vec<ActivityEntry> {
        self.activity.read().await.clone()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn client(&self, id: &str) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.read().await.get(id).cloned())
    }

    async fn search_clients(&self, query: &str) -> Result<Vec<Client>, StoreError> {
        let needle = query.to_lowercase();
        let mut results: Vec<Client> = self
            .clients
            .read()
            .await
            .values()
            .filter(|c| {
                needle.is_empty()
                    || c.name.to_lowercase().contains(&needle)
                    || c.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| a.name.cmp(&b.name));
        results.truncate(MAX_PAGE);
        Ok(results)
    }

    async fn update_client_status(
        &self,
        id: &str,
        status: ClientStatus,
    ) -> Result<ClientStatus, StoreError> {
        let mut clients = self.clients.write().await;
        let client = clients
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("client", id))?;
        let old = client.status;
        client.status = status;
        debug!(client_id = id, old = %old, new = %status, "client status updated");
        Ok(old)
    }

    async fn properties_for(&self, owner_id: &str) -> Result<Vec<Property>, StoreError> {
        let mut results: Vec<Property> = self
            .properties
            .read()
            .await
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        results.truncate(MAX_PAGE);
        Ok(results)
    }

    async fn valuations_for(&self, property_id: &str) -> Result<Vec<Valuation>, StoreError> {
        let mut results: Vec<Valuation> = self
            .valuations
            .read()
            .await
            .iter()
            .filter(|v| v.property_id == property_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.valued_at.cmp(&a.valued_at));
        results.truncate(MAX_PAGE);
        Ok(results)
    }

    async fn offers_for(&self, client_id: &str) -> Result<Vec<Offer>, StoreError> {
        let mut results: Vec<Offer> = self
            .offers
            .read()
            .await
            .iter()
            .filter(|o| o.client_id == client_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results.truncate(MAX_PAGE);
        Ok(results)
    }

    async fn search_documents(
        &self,
        owner_id: &str,
        query: &str,
    ) -> Result<Vec<DocumentMeta>, StoreError> {
        let needle = query.to_lowercase();
        let mut results: Vec<DocumentMeta> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| {
                d.owner_id == owner_id
                    && (needle.is_empty() || d.title.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        results.truncate(MAX_PAGE);
        Ok(results)
    }

    async fn document(&self, id: &str) -> Result<Option<DocumentMeta>, StoreError> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn insert_document(&self, doc: DocumentMeta) -> Result<(), StoreError> {
        self.documents.write().await.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn insert_notification(&self, notification: Notification) -> Result<(), StoreError> {
        self.notifications.write().await.push(notification);
        Ok(())
    }

    async fn insert_chat_message(&self, message: ChatMessageRecord) -> Result<(), StoreError> {
        self.chat_messages.write().await.push(message);
        Ok(())
    }

    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        self.activity.write().await.push(entry);
        Ok(())
    }

    async fn activities_for_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<ActivityEntry>, StoreError> {
        Ok(self
            .activity
            .read()
            .await
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn client(id: &str, name: &str, status: ClientStatus) -> Client {
        Client {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            status,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_update_client_status_returns_old() {
        let store = MemoryStore::new();
        store
            .seed_client(client("U1", "Müller", ClientStatus::Prospect))
            .await;

        let old = store
            .update_client_status("U1", ClientStatus::Active)
            .await
            .unwrap();
        assert_eq!(old, ClientStatus::Prospect);
        assert_eq!(
            store.client("U1").await.unwrap().unwrap().status,
            ClientStatus::Active
        );
    }

    #[tokio::test]
    async fn test_update_missing_client_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_client_status("U9", ClientStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_search_clients_capped() {
        let store = MemoryStore::new();
        for i in 0..30 {
            store
                .seed_client(client(&format!("U{i}"), &format!("Kunde{i:02}"), ClientStatus::Active))
                .await;
        }
        let results = store.search_clients("").await.unwrap();
        assert_eq!(results.len(), MAX_PAGE);
    }

    #[tokio::test]
    async fn test_properties_scoped_to_owner() {
        let store = MemoryStore::new();
        store
            .seed_property(Property {
                id: "P1".into(),
                owner_id: "U1".into(),
                address: "Hauptstraße 1, Berlin".into(),
                purchase_price: 300_000.0,
                current_value: 350_000.0,
                rental_income: 1_200.0,
                size_sqm: 80.0,
            })
            .await;
        store
            .seed_property(Property {
                id: "P2".into(),
                owner_id: "U2".into(),
                address: "Ringstraße 5, Hamburg".into(),
                purchase_price: 200_000.0,
                current_value: 210_000.0,
                rental_income: 800.0,
                size_sqm: 55.0,
            })
            .await;

        let mine = store.properties_for("U1").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "P1");
    }

    #[tokio::test]
    async fn test_activity_log_is_append_only() {
        let store = MemoryStore::new();
        store
            .append_activity(ActivityEntry::new(
                "A1",
                crate::entity::ActionKind::ClientStatusChanged,
                "client",
                "U1",
                serde_json::json!({"old": "prospect", "new": "active"}),
            ))
            .await
            .unwrap();
        store
            .append_activity(ActivityEntry::new(
                "A1",
                crate::entity::ActionKind::ClientStatusChanged,
                "client",
                "U1",
                serde_json::json!({"old": "active", "new": "inactive"}),
            ))
            .await
            .unwrap();

        let entries = store.activities_for_entity("U1").await.unwrap();
        assert_eq!(entries.len(), 2);
    }
}
