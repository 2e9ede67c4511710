//! Error types for the session API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Bodies
//! are always `{"error": <message>, "status": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sandbox_core::SimulationError;
use sandbox_oracle::BackendError;
use sandbox_types::SessionId;

/// Errors that can occur in the session API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No session exists with the given id.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session id in the path is not a UUID.
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    /// A simulation operation failed.
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    /// The configured oracle backend could not be built.
    #[error("oracle backend unavailable: {0}")]
    Backend(#[from] BackendError),
}

impl ApiError {
    /// The HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidSessionId(_) | Self::Simulation(SimulationError::NotInitialized) => {
                StatusCode::BAD_REQUEST
            }
            Self::Simulation(
                SimulationError::ReentrantTurnStart | SimulationError::NoPendingPlayerDecision,
            ) => StatusCode::CONFLICT,
            Self::Simulation(
                SimulationError::PlayerInputInvalid { .. } | SimulationError::InvalidSetup(_),
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Simulation(SimulationError::OracleTransport { .. }) => StatusCode::BAD_GATEWAY,
            Self::Simulation(SimulationError::World { .. }) | Self::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
