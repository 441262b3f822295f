//! Approval endpoint: record an operator decision and resume the turn.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::Stream;
use serde::Deserialize;

use immo_tool_runtime::{ApprovalGate, Conversation};

use crate::principal::principal_from_headers;
use crate::state::AppState;

use super::chat::{run_turn, SYSTEM_PROMPT};
use super::{internal_error, not_found, ApiError, ErrorResponse};

const CONTEXT_TOKEN_BUDGET: usize = 8192;

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

/// Accept or reject one pending tool call, then continue the suspended
/// turn. Each call is decided independently; other calls in the same
/// step stay pending until their own decision arrives.
pub async fn session_approval(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((id, call_id)): Path<(String, String)>,
    Json(req): Json<ApprovalRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let principal = principal_from_headers(&headers)?;
    let session = state
        .sessions
        .get_owned(&id, &principal)
        .map_err(internal_error)?
        .ok_or_else(|| not_found(&id))?;

    let known_call = session
        .messages
        .iter()
        .flat_map(|m| m.invocations())
        .any(|inv| inv.id == call_id && inv.is_pending_approval());
    if !known_call {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No pending approval for call: {}", call_id),
            }),
        ));
    }

    let mut gate = ApprovalGate::new();
    gate.record(call_id, req.approved);

    // The resumed turn keeps the steps it consumed before suspending;
    // an approval round-trip does not refresh the budget.
    let conversation = Conversation::from_messages(session.messages, CONTEXT_TOKEN_BUDGET)
        .with_system_prompt(SYSTEM_PROMPT.to_string())
        .with_turn_steps(session.turn_steps);
    run_turn(state, id, principal, conversation, Some(gate))
}
