//! Chat endpoint: one agent turn over SSE.
//!
//! The client sends the full message-list snapshot for the session,
//! including the new user message. Replayed history is harmless: the
//! snapshot upsert is idempotent per message id and already-resolved
//! tool calls are never re-executed.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::warn;

use immo_core::Principal;
use immo_tool_runtime::{
    AgentLoop, ApprovalGate, CompletionReason, Conversation, Message, Role, ToolContext,
    ToolRegistry, TurnOutcome,
};

use crate::state::AppState;

use super::{internal_error, not_found, ApiError, ErrorResponse};
use crate::principal::principal_from_headers;

const CONTEXT_TOKEN_BUDGET: usize = 8192;

pub(super) const SYSTEM_PROMPT: &str = "Du bist der Assistent eines Immobilien-Investoren-Portals. \
    Beantworte Fragen zum Portfolio, zu Dokumenten und Angeboten des Nutzers. \
    Nutze die bereitgestellten Werkzeuge und antworte auf Deutsch.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Full snapshot of the conversation, new user message last.
    pub messages: Vec<Message>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Run one agent turn for a session and stream its events as SSE.
pub async fn session_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let principal = principal_from_headers(&headers)?;
    state
        .sessions
        .get_owned(&id, &principal)
        .map_err(internal_error)?
        .ok_or_else(|| not_found(&id))?;

    state
        .sessions
        .replace_messages(&id, req.messages.clone())
        .map_err(internal_error)?;

    let conversation = Conversation::from_messages(req.messages, CONTEXT_TOKEN_BUDGET)
        .with_system_prompt(req.system_prompt.unwrap_or_else(|| SYSTEM_PROMPT.to_string()));

    run_turn(state, id, principal, conversation, None)
}

/// Shared turn driver for the chat and approval endpoints. Enforces
/// single-flight per session and persists the conversation after the
/// turn settles.
pub(super) fn run_turn(
    state: Arc<AppState>,
    session_id: String,
    principal: Principal,
    mut conversation: Conversation,
    gate: Option<ApprovalGate>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let guard = state
        .turn_lock(&session_id)
        .try_lock_owned()
        .map_err(|_| {
            (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: "Eine Antwort wird für diese Unterhaltung bereits erzeugt".to_string(),
                }),
            )
        })?;

    let registry = ToolRegistry::for_scope(principal.scope).map_err(internal_error)?;
    let agent = AgentLoop::new(state.provider.clone(), Arc::new(registry))
        .with_max_steps(state.max_steps);
    let tool_context = ToolContext {
        principal,
        store: state.store.clone(),
        blobs: state.blobs.clone(),
        mailer: state.mailer.clone(),
    };

    let (tx, rx) = tokio::sync::mpsc::channel::<Value>(256);

    tokio::spawn(async move {
        let _guard = guard;
        let outcome = match &gate {
            None => agent.run(&mut conversation, &tool_context).await,
            Some(gate) => agent.resume(&mut conversation, gate, &tool_context).await,
        };

        let (events, done) = match outcome {
            Ok(TurnOutcome::Completed { events, reason }) => {
                let reason = match reason {
                    CompletionReason::EndTurn => "end_turn",
                    CompletionReason::StepBudgetExhausted => "step_budget_exhausted",
                };
                let done = json!({
                    "type": "done",
                    "reason": reason,
                    "views": render_views(&state, &conversation),
                });
                (events, done)
            }
            Ok(TurnOutcome::AwaitingApproval { events, pending }) => {
                let done = json!({
                    "type": "approval_required",
                    "pending": pending,
                    "views": render_views(&state, &conversation),
                });
                (events, done)
            }
            Err(e) => {
                warn!(session = %session_id, error = %e, "agent turn failed");
                (Vec::new(), json!({"type": "error", "message": e.to_string()}))
            }
        };

        for event in &events {
            let value = serde_json::to_value(event).unwrap_or_else(|_| json!({}));
            if tx.send(value).await.is_err() {
                break;
            }
        }

        if let Err(e) = state
            .sessions
            .replace_messages(&session_id, conversation.messages().to_vec())
        {
            warn!(session = %session_id, error = %e, "failed to persist conversation");
        }
        if let Err(e) = state
            .sessions
            .set_turn_steps(&session_id, conversation.turn_steps())
        {
            warn!(session = %session_id, error = %e, "failed to persist step count");
        }

        let _ = tx.send(done).await;
    });

    let sse_stream = ReceiverStream::new(rx).map(|value| {
        let data = serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });
    Ok(Sse::new(sse_stream))
}

/// Presentation views for every resolved tool call in the last
/// assistant turn. Rendering is fail-soft; a mismatch degrades to the
/// raw payload instead of failing the response.
fn render_views(state: &AppState, conversation: &Conversation) -> Vec<Value> {
    let Some(last) = conversation
        .messages()
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
    else {
        return Vec::new();
    };
    last.invocations()
        .filter(|inv| inv.is_terminal())
        .map(|inv| {
            let (payload, is_error) = match &inv.error {
                Some(error) => (json!({ "error": error }), true),
                None => (inv.output.clone().unwrap_or(Value::Null), false),
            };
            let view = state.render.render(&inv.tool_name, &payload, is_error);
            json!({ "callId": inv.id, "view": view })
        })
        .collect()
}
