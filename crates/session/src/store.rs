use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use immo_core::{Principal, Scope};
use immo_tool_runtime::{Message, Role};

/// Title a session carries until the first user message names it.
pub const PLACEHOLDER_TITLE: &str = "Neue Unterhaltung";

const TITLE_MAX_CHARS: usize = 60;

/// A persisted conversation with all its messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub principal_id: String,
    pub scope: Scope,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    /// Loop steps the in-flight turn has consumed. Carried across an
    /// approval round-trip so a resumed turn keeps its budget.
    #[serde(default)]
    pub turn_steps: usize,
}

/// Lightweight session listing entry (no messages).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            message_count: session.messages.len(),
        }
    }
}

/// File-based session store — one JSON file per session. Deleting the
/// file cascades to the messages, which live inside it.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Create a new session store, ensuring the storage directory exists.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("sessions");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create session dir: {}", dir.display()))?;
        info!(path = %dir.display(), "session store initialized");
        Ok(Self { dir })
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// List a principal's sessions sorted by updated_at descending.
    /// Corrupt files are skipped, not fatal.
    pub fn list(&self, principal_id: &str) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                match std::fs::read_to_string(&path) {
                    Ok(data) => match serde_json::from_str::<Session>(&data) {
                        Ok(session) if session.principal_id == principal_id => {
                            summaries.push(SessionSummary::from(&session));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping corrupt session");
                        }
                    },
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to read session");
                    }
                }
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// Get a full session by ID.
    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read session: {}", id))?;
        let session = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse session: {}", id))?;
        Ok(Some(session))
    }

    /// Get a session only if the principal owns it. Admins may open
    /// any session.
    pub fn get_owned(&self, id: &str, principal: &Principal) -> Result<Option<Session>> {
        Ok(self
            .get(id)?
            .filter(|s| principal.is_admin() || s.principal_id == principal.id))
    }

    /// Create a new empty session for a principal.
    pub fn create(&self, principal: &Principal) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            principal_id: principal.id.clone(),
            scope: principal.scope,
            title: PLACEHOLDER_TITLE.to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            turn_steps: 0,
        };
        self.save(&session)?;
        info!(id = %session.id, principal = %principal.id, "session created");
        Ok(session)
    }

    /// Rename a session. An explicit rename always sticks; the title
    /// derivation below never overwrites it afterwards.
    pub fn rename(&self, id: &str, title: &str) -> Result<Option<Session>> {
        let Some(mut session) = self.get(id)? else {
            return Ok(None);
        };
        session.title = title.to_string();
        session.updated_at = Utc::now();
        self.save(&session)?;
        Ok(Some(session))
    }

    /// Insert or replace a message, idempotent per message id.
    /// Replaying the same message never duplicates it; a changed body
    /// under a known id (a resolved tool call, say) replaces the stored
    /// one in place.
    pub fn upsert_message(&self, id: &str, message: Message) -> Result<Option<Session>> {
        let Some(mut session) = self.get(id)? else {
            return Ok(None);
        };

        // One-shot title derivation from the first user message,
        // only while the placeholder is still in place.
        if session.title == PLACEHOLDER_TITLE && message.role == Role::User {
            let text = message.text();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                session.title = trimmed.chars().take(TITLE_MAX_CHARS).collect();
            }
        }

        match session.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => session.messages.push(message),
        }
        session.updated_at = Utc::now();
        self.save(&session)?;
        Ok(Some(session))
    }

    /// Replace the full message list, idempotent per message id.
    /// Used when a turn ends and the conversation snapshot is flushed.
    pub fn replace_messages(&self, id: &str, messages: Vec<Message>) -> Result<Option<Session>> {
        let Some(mut session) = self.get(id)? else {
            return Ok(None);
        };

        if session.title == PLACEHOLDER_TITLE {
            if let Some(first_user) = messages.iter().find(|m| m.role == Role::User) {
                let text = first_user.text();
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    session.title = trimmed.chars().take(TITLE_MAX_CHARS).collect();
                }
            }
        }

        session.messages = messages;
        session.updated_at = Utc::now();
        self.save(&session)?;
        Ok(Some(session))
    }

    /// Record the in-flight turn's consumed loop steps.
    pub fn set_turn_steps(&self, id: &str, steps: usize) -> Result<Option<Session>> {
        let Some(mut session) = self.get(id)? else {
            return Ok(None);
        };
        session.turn_steps = steps;
        self.save(&session)?;
        Ok(Some(session))
    }

    /// Delete a session and, with it, all its messages.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to delete session: {}", id))?;
        info!(id = %id, "session deleted");
        Ok(true)
    }

    fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.id);
        let data = serde_json::to_string_pretty(session)?;
        std::fs::write(&path, data)
            .with_context(|| format!("failed to write session: {}", session.id))?;
        Ok(())
    }
}
