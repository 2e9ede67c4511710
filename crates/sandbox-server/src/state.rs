//! Shared application state for the session API server.
//!
//! [`AppState`] holds the loaded configuration and the session table. The
//! table is behind a read-write lock that is only held long enough to look
//! up, insert, or remove a session; turn operations lock the session's own
//! mutex instead, so one slow oracle never blocks other sessions.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sandbox_core::config::WorldConfig;
use sandbox_core::{ResetParams, SandboxConfig, Simulation};
use sandbox_oracle::OracleBackend;
use sandbox_types::{SessionId, WorldSnapshot};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::error::ApiError;

/// Reset parameters as sent by a client. Omitted fields use the configured
/// world defaults.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ResetRequest {
    /// Side length of the square grid.
    pub grid_size: Option<u32>,
    /// Number of agents, including the interactive one.
    pub num_agents: Option<usize>,
    /// Placement and mock-oracle seed.
    pub seed: Option<u64>,
    /// Whether the last agent is controlled by the player.
    pub player_agent: Option<bool>,
}

impl ResetRequest {
    /// Fill omitted fields from `defaults`.
    pub fn resolve(self, defaults: &WorldConfig) -> ResetParams {
        ResetParams {
            grid_size: self.grid_size.unwrap_or(defaults.grid_size),
            num_agents: self.num_agents.unwrap_or(defaults.num_agents),
            seed: self.seed.or(defaults.seed),
            player_agent: self.player_agent.unwrap_or(defaults.player_agent),
        }
    }
}

/// One caller-owned simulation.
pub struct Session {
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// The simulation. Held for the whole of each turn operation.
    pub simulation: Mutex<Simulation<OracleBackend>>,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState {
    /// The configuration the server was started with.
    pub config: SandboxConfig,
    /// When the server started.
    pub started_at: DateTime<Utc>,
    sessions: RwLock<BTreeMap<SessionId, Arc<Session>>>,
}

impl AppState {
    /// Create application state with no sessions.
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            started_at: Utc::now(),
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a fresh simulation with a new oracle and reset it.
    ///
    /// The oracle is seeded with the reset seed, so a seeded mock session
    /// replays identically.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Backend`] if the oracle cannot be built and
    /// [`ApiError::Simulation`] if the reset parameters are invalid.
    pub fn build_simulation(
        &self,
        request: ResetRequest,
    ) -> Result<(Simulation<OracleBackend>, WorldSnapshot), ApiError> {
        let params = request.resolve(&self.config.world);
        let oracle = OracleBackend::from_config(&self.config.oracle, params.seed)?;
        let mut simulation = Simulation::new(oracle);
        let snapshot = simulation.reset(params)?;
        Ok((simulation, snapshot))
    }

    /// Create and register a new session.
    ///
    /// # Errors
    ///
    /// See [`AppState::build_simulation`].
    pub async fn create_session(
        &self,
        request: ResetRequest,
    ) -> Result<(SessionId, WorldSnapshot), ApiError> {
        let (simulation, snapshot) = self.build_simulation(request)?;
        let id = SessionId::new();
        let session = Arc::new(Session {
            created_at: Utc::now(),
            simulation: Mutex::new(simulation),
        });
        self.sessions.write().await.insert(id, session);
        info!(session = %id, backend = %snapshot.backend, "Session created");
        Ok((id, snapshot))
    }

    /// Look up a session.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::SessionNotFound`] for an unknown id.
    pub async fn session(&self, id: SessionId) -> Result<Arc<Session>, ApiError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ApiError::SessionNotFound(id))
    }

    /// Remove a session. Returns whether it existed.
    pub async fn remove_session(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session = %id, "Session deleted");
        }
        removed
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reset_request_fills_defaults() {
        let defaults = WorldConfig {
            grid_size: 4,
            num_agents: 3,
            seed: Some(9),
            player_agent: true,
        };
        let params = ResetRequest {
            num_agents: Some(2),
            ..ResetRequest::default()
        }
        .resolve(&defaults);
        assert_eq!(params.grid_size, 4);
        assert_eq!(params.num_agents, 2);
        assert_eq!(params.seed, Some(9));
        assert!(params.player_agent);
    }

    #[tokio::test]
    async fn sessions_are_created_and_removed() {
        let state = AppState::new(SandboxConfig::default());
        let (id, snapshot) = state.create_session(ResetRequest::default()).await.unwrap();
        assert_eq!(snapshot.turn, 0);
        assert_eq!(snapshot.backend, "mock");
        assert_eq!(state.session_count().await, 1);
        assert!(state.session(id).await.is_ok());

        assert!(state.remove_session(id).await);
        assert!(!state.remove_session(id).await);
        assert!(matches!(
            state.session(id).await,
            Err(ApiError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_reset_creates_nothing() {
        let state = AppState::new(SandboxConfig::default());
        let result = state
            .create_session(ResetRequest {
                num_agents: Some(1),
                ..ResetRequest::default()
            })
            .await;
        assert!(matches!(result, Err(ApiError::Simulation(_))));
        assert_eq!(state.session_count().await, 0);
    }
}
