//! Per-invocation lifecycle and the human-in-the-loop approval gate.
//!
//! Every tool call the model requests becomes a [`ToolInvocation`] that
//! walks an explicit state machine. Side-effecting tools pass through
//! `ApprovalRequested` and only run after an operator accepts; a reject
//! is terminal and produces a synthetic declined result so the model
//! can acknowledge the refusal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a single tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "phase")]
pub enum InvocationState {
    /// Arguments still arriving from the model stream
    InputStreaming,
    /// Arguments complete, not yet dispatched
    InputAvailable,
    /// Waiting on the operator (side-effecting tool)
    ApprovalRequested,
    /// Operator decided; executor may run if approved
    ApprovalResponded { approved: bool },
    /// Executor finished with a payload
    OutputAvailable,
    /// Executor finished with an error payload
    OutputError,
    /// Operator declined; executor never ran
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("invalid transition from {from:?} for call {call_id}")]
    InvalidTransition {
        call_id: String,
        from: InvocationState,
    },
}

/// One tool call requested by the model, tracked from stream start to
/// resolution. Embedded in the owning assistant message's parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub tool_name: String,
    pub state: InvocationState,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolInvocation {
    /// A call whose arguments are still streaming in.
    pub fn streaming(id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            state: InvocationState::InputStreaming,
            input: Value::Null,
            output: None,
            error: None,
        }
    }

    /// A call with complete, validated-shape arguments.
    pub fn ready(id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            state: InvocationState::InputAvailable,
            input,
            output: None,
            error: None,
        }
    }

    fn invalid(&self) -> InvocationError {
        InvocationError::InvalidTransition {
            call_id: self.id.clone(),
            from: self.state,
        }
    }

    pub fn finish_input(&mut self, input: Value) -> Result<(), InvocationError> {
        match self.state {
            InvocationState::InputStreaming => {
                self.input = input;
                self.state = InvocationState::InputAvailable;
                Ok(())
            }
            _ => Err(self.invalid()),
        }
    }

    pub fn request_approval(&mut self) -> Result<(), InvocationError> {
        match self.state {
            InvocationState::InputAvailable => {
                self.state = InvocationState::ApprovalRequested;
                Ok(())
            }
            _ => Err(self.invalid()),
        }
    }

    pub fn respond(&mut self, approved: bool) -> Result<(), InvocationError> {
        match self.state {
            InvocationState::ApprovalRequested => {
                self.state = InvocationState::ApprovalResponded { approved };
                Ok(())
            }
            _ => Err(self.invalid()),
        }
    }

    /// Executor finished successfully. Valid from `InputAvailable`
    /// (auto-approved tool) or an accepted `ApprovalResponded`.
    pub fn complete(&mut self, output: Value) -> Result<(), InvocationError> {
        match self.state {
            InvocationState::InputAvailable
            | InvocationState::ApprovalResponded { approved: true } => {
                self.output = Some(output);
                self.state = InvocationState::OutputAvailable;
                Ok(())
            }
            _ => Err(self.invalid()),
        }
    }

    /// Executor finished with an error payload.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvocationError> {
        match self.state {
            InvocationState::InputAvailable
            | InvocationState::ApprovalResponded { approved: true } => {
                self.error = Some(error.into());
                self.state = InvocationState::OutputError;
                Ok(())
            }
            _ => Err(self.invalid()),
        }
    }

    /// Terminal rejection. The executor never runs; a synthetic
    /// declined payload is recorded so the model can acknowledge it.
    pub fn reject(&mut self) -> Result<(), InvocationError> {
        match self.state {
            InvocationState::ApprovalResponded { approved: false } => {
                self.output = Some(declined_payload());
                self.state = InvocationState::Rejected;
                Ok(())
            }
            _ => Err(self.invalid()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            InvocationState::OutputAvailable
                | InvocationState::OutputError
                | InvocationState::Rejected
        )
    }

    pub fn is_pending_approval(&self) -> bool {
        self.state == InvocationState::ApprovalRequested
    }
}

/// Synthetic result fed back to the model after an operator reject.
pub fn declined_payload() -> Value {
    serde_json::json!({
        "success": false,
        "declined": true,
        "message": "Aktion nicht ausgeführt: vom Benutzer abgelehnt.",
    })
}

/// Records operator decisions per call id and applies them to pending
/// invocations. Approval is per-invocation: the same tool called twice
/// in one conversation is gated twice, independently. No timeout and
/// no auto-approval; an unresolved request blocks its step until the
/// operator responds or the session is abandoned.
#[derive(Debug, Default)]
pub struct ApprovalGate {
    decisions: HashMap<String, bool>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the operator's accept/reject for one invocation.
    pub fn record(&mut self, call_id: impl Into<String>, approved: bool) {
        self.decisions.insert(call_id.into(), approved);
    }

    pub fn decision(&self, call_id: &str) -> Option<bool> {
        self.decisions.get(call_id).copied()
    }

    /// Apply a recorded decision to a pending invocation. Returns the
    /// decision if one was recorded, `None` if the invocation stays
    /// pending. A reject transitions the invocation terminally.
    pub fn apply(&self, invocation: &mut ToolInvocation) -> Result<Option<bool>, InvocationError> {
        let Some(approved) = self.decision(&invocation.id) else {
            return Ok(None);
        };
        invocation.respond(approved)?;
        if !approved {
            invocation.reject()?;
        }
        Ok(Some(approved))
    }
}
