//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route(
            "/sessions",
            get(api::sessions_list).post(api::sessions_create),
        )
        .route(
            "/sessions/{id}",
            get(api::session_get)
                .put(api::session_rename)
                .delete(api::session_delete),
        )
        .route("/sessions/{id}/chat", post(api::session_chat))
        .route(
            "/sessions/{id}/approvals/{call_id}",
            post(api::session_approval),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
