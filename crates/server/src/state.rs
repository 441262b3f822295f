use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use immo_core::DataStore;
use immo_notify::Mailer;
use immo_render::RenderRegistry;
use immo_session::SessionStore;
use immo_storage::BlobStore;
use immo_tool_runtime::ToolAwareLlmProvider;

pub struct AppState {
    pub sessions: SessionStore,
    pub store: Arc<dyn DataStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub mailer: Arc<dyn Mailer>,
    pub provider: Arc<dyn ToolAwareLlmProvider>,
    pub render: RenderRegistry,
    pub max_steps: usize,
    /// One in-flight agent turn per session; a second chat request for
    /// the same session is turned away, not queued.
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppState {
    pub fn new(
        sessions: SessionStore,
        store: Arc<dyn DataStore>,
        blobs: Arc<dyn BlobStore>,
        mailer: Arc<dyn Mailer>,
        provider: Arc<dyn ToolAwareLlmProvider>,
        max_steps: usize,
    ) -> Self {
        Self {
            sessions,
            store,
            blobs,
            mailer,
            provider,
            render: RenderRegistry::standard(),
            max_steps,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn turn_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .turn_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
