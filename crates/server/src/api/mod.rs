//! HTTP handlers.

mod approvals;
mod chat;
mod sessions;

pub use approvals::session_approval;
pub use chat::session_chat;
pub use sessions::{
    session_delete, session_get, session_rename, sessions_create, sessions_list,
};

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn internal_error(err: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

pub(crate) fn not_found(session_id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Session not found: {}", session_id),
        }),
    )
}

pub async fn health() -> &'static str {
    "ok"
}
