//! Session CRUD endpoints: list, create, get, rename, delete.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use immo_session::{Session, SessionSummary};

use crate::principal::principal_from_headers;
use crate::state::AppState;

use super::{internal_error, not_found, ApiError};

#[derive(Debug, Deserialize)]
pub struct SessionRenameRequest {
    pub title: String,
}

/// List the caller's sessions, newest activity first.
pub async fn sessions_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let principal = principal_from_headers(&headers)?;
    state
        .sessions
        .list(&principal.id)
        .map(Json)
        .map_err(internal_error)
}

/// Create a new empty session for the caller.
pub async fn sessions_create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let principal = principal_from_headers(&headers)?;
    state
        .sessions
        .create(&principal)
        .map(|s| (StatusCode::CREATED, Json(s)))
        .map_err(internal_error)
}

/// Get a full session including messages. Foreign sessions read as
/// not found for standard callers.
pub async fn session_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let principal = principal_from_headers(&headers)?;
    state
        .sessions
        .get_owned(&id, &principal)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

/// Rename a session. Explicit titles are never overwritten by
/// auto-derivation afterwards.
pub async fn session_rename(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<SessionRenameRequest>,
) -> Result<Json<Session>, ApiError> {
    let principal = principal_from_headers(&headers)?;
    if state
        .sessions
        .get_owned(&id, &principal)
        .map_err(internal_error)?
        .is_none()
    {
        return Err(not_found(&id));
    }
    state
        .sessions
        .rename(&id, &req.title)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

/// Delete a session and all its messages.
pub async fn session_delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let principal = principal_from_headers(&headers)?;
    if state
        .sessions
        .get_owned(&id, &principal)
        .map_err(internal_error)?
        .is_none()
    {
        return Err(not_found(&id));
    }
    if state.sessions.delete(&id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}
