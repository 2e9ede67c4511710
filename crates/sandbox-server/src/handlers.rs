//! REST API endpoint handlers for the session server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness, backend name, session count |
//! | `POST` | `/sessions` | Create a session (optional reset body) |
//! | `POST` | `/sessions/{id}/reset` | Replace the session's world |
//! | `POST` | `/sessions/{id}/step` | Run one turn |
//! | `POST` | `/sessions/{id}/player-action` | Answer a pending player decision |
//! | `GET` | `/sessions/{id}/state` | Snapshot, history, and pending request |
//! | `DELETE` | `/sessions/{id}` | Drop the session |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use sandbox_types::{PendingPlayerRequest, SessionId, StepOutcome, TurnRecord, WorldSnapshot};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{AppState, ResetRequest};

/// Response body for `POST /sessions`.
#[derive(Debug, Serialize)]
pub struct SessionCreated {
    /// Id to use in subsequent requests.
    pub session_id: SessionId,
    /// The freshly reset world.
    pub snapshot: WorldSnapshot,
}

/// Response body for `GET /sessions/{id}/state`.
#[derive(Debug, Serialize)]
pub struct SessionState {
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Current world snapshot.
    pub snapshot: WorldSnapshot,
    /// Every sealed turn, oldest first.
    pub history: Vec<TurnRecord>,
    /// The outstanding player request, if a turn is suspended.
    pub pending: Option<PendingPlayerRequest>,
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse::<Uuid>()
        .map(SessionId::from)
        .map_err(|e| ApiError::InvalidSessionId(format!("{raw}: {e}")))
}

/// Report liveness.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "backend": state.config.oracle.backend,
        "sessions": state.session_count().await,
        "started_at": state.started_at,
    }))
}

/// Create a session and reset its world.
///
/// The body is optional; omitted fields use the configured defaults.
///
/// # Errors
///
/// Returns 422 for impossible reset parameters and 500 if the oracle
/// backend cannot be built.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ResetRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let (session_id, snapshot) = state.create_session(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id,
            snapshot,
        }),
    ))
}

/// Reset an existing session, discarding its history and any pending turn.
///
/// # Errors
///
/// Returns 404 for an unknown session and 422 for impossible parameters.
/// A rejected reset leaves the session untouched.
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ResetRequest>>,
) -> Result<Json<WorldSnapshot>, ApiError> {
    let id = parse_session_id(&id)?;
    let session = state.session(id).await?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let mut simulation = session.simulation.lock().await;
    let (fresh, snapshot) = state.build_simulation(request)?;
    *simulation = fresh;
    info!(
        session = %id,
        grid_size = snapshot.grid_size,
        agents = snapshot.agents.len(),
        "Session reset"
    );
    Ok(Json(snapshot))
}

/// Run one turn, stopping early if the interactive agent must decide.
///
/// # Errors
///
/// Returns 409 while a player decision is pending and 502 if the oracle
/// fails.
pub async fn step(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StepOutcome>, ApiError> {
    let id = parse_session_id(&id)?;
    let session = state.session(id).await?;
    let mut simulation = session.simulation.lock().await;
    let outcome = simulation.step().await?;
    Ok(Json(outcome))
}

/// Submit the pending player decision and finish the turn.
///
/// The body is an action object such as `{"action": "move", "direction":
/// "up"}`.
///
/// # Errors
///
/// Returns 409 if nothing is pending and 422 if the action is rejected; a
/// rejected action leaves the request pending.
pub async fn player_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(action): Json<Value>,
) -> Result<Json<StepOutcome>, ApiError> {
    let id = parse_session_id(&id)?;
    let session = state.session(id).await?;
    let mut simulation = session.simulation.lock().await;
    let outcome = simulation.apply_player_action(&action).await?;
    Ok(Json(outcome))
}

/// Read the session's snapshot, history, and pending request.
///
/// # Errors
///
/// Returns 404 for an unknown session.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionState>, ApiError> {
    let id = parse_session_id(&id)?;
    let session = state.session(id).await?;
    let simulation = session.simulation.lock().await;
    Ok(Json(SessionState {
        created_at: session.created_at,
        snapshot: simulation.snapshot()?,
        history: simulation.history().to_vec(),
        pending: simulation.pending().cloned(),
    }))
}

/// Delete a session.
///
/// # Errors
///
/// Returns 404 for an unknown session.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    if state.remove_session(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}
