use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use immo_core::{DataStore, Principal};
use immo_notify::Mailer;
use immo_storage::BlobStore;

/// Describes a tool's interface for LLM consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g. "portfolio_summary", "send_email")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// JSON Schema describing the expected input
    pub input_schema: Value,
    /// Side-effecting tools require an operator decision before they run
    pub needs_approval: bool,
}

/// Represents an LLM requesting execution of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this invocation (used to match results)
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// JSON input arguments
    pub input: Value,
}

/// Result of executing a tool, sent back to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Must match the ToolCall id
    pub tool_call_id: String,
    /// Result content (JSON payload)
    pub content: String,
    /// Whether this result represents an error
    pub is_error: bool,
}

impl ToolResult {
    /// A success result with a JSON payload.
    pub fn success(payload: &Value) -> Result<Self, ToolError> {
        Ok(Self {
            tool_call_id: String::new(),
            content: serde_json::to_string(payload)
                .map_err(|e| ToolError::ExecutionFailed(format!("JSON serialization failed: {e}")))?,
            is_error: false,
        })
    }

    /// A recoverable business failure: authorization denial, missing
    /// entity, downstream error. The payload carries an explicit error
    /// message so the model can explain the failure to the user.
    pub fn failure(message: impl Into<String>) -> Self {
        let payload = serde_json::json!({
            "success": false,
            "error": message.into(),
        });
        Self {
            tool_call_id: String::new(),
            content: payload.to_string(),
            is_error: true,
        }
    }
}

/// Context passed explicitly into every tool execution. Carries the
/// caller identity and the boundary collaborators; executors never
/// reach for global state.
#[derive(Clone)]
pub struct ToolContext {
    pub principal: Principal,
    pub store: Arc<dyn DataStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub mailer: Arc<dyn Mailer>,
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async. Executors must not
/// let errors escape as panics; business failures are returned as
/// [`ToolResult::failure`] payloads, malformed input as
/// [`ToolError::InvalidInput`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, JSON Schema,
    /// approval flag).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given JSON input.
    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

/// Validate raw invocation input against a typed input struct. Rejects
/// before the executor body runs; the schema error is reported to the
/// model on the tool-error channel, never silently coerced.
pub fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    //! Test fixtures shared across runtime and tool tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use immo_core::MemoryStore;
    use immo_notify::MemoryMailer;
    use immo_storage::BlobBackend;

    /// Build a ToolContext over in-memory collaborators.
    pub fn memory_context(principal: Principal) -> (ToolContext, Arc<MemoryStore>, Arc<MemoryMailer>) {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(MemoryMailer::new());
        let ctx = ToolContext {
            principal,
            store: store.clone(),
            blobs: Arc::new(BlobBackend::memory()),
            mailer: mailer.clone(),
        };
        (ctx, store, mailer)
    }

    /// A configurable tool for loop and gate tests: fixed name and
    /// approval flag, counts how often its executor actually ran.
    pub struct CountingTool {
        pub name: String,
        pub needs_approval: bool,
        pub executions: Arc<AtomicUsize>,
    }

    impl CountingTool {
        pub fn new(name: &str, needs_approval: bool) -> Self {
            Self {
                name: name.to_string(),
                needs_approval,
                executions: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn execution_count(&self) -> usize {
            self.executions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.clone(),
                description: "Counts executions. For testing.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" }
                    }
                }),
                needs_approval: self.needs_approval,
            }
        }

        async fn execute(
            &self,
            input: Value,
            _context: &ToolContext,
        ) -> Result<ToolResult, ToolError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            let message = input
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("ok");
            ToolResult::success(&serde_json::json!({ "success": true, "message": message }))
        }
    }
}
