//! Axum router construction for the session API.
//!
//! Assembles all routes into a single [`Router`] with CORS and request
//! tracing middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the session server.
///
/// CORS allows any origin so a browser front end can be served from
/// elsewhere.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/{id}", delete(handlers::delete_session))
        .route("/sessions/{id}/reset", post(handlers::reset_session))
        .route("/sessions/{id}/step", post(handlers::step))
        .route("/sessions/{id}/player-action", post(handlers::player_action))
        .route("/sessions/{id}/state", get(handlers::get_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
