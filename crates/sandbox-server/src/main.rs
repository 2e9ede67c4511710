//! Sandbox server binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `sandbox-config.yaml` (or `SANDBOX_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Check that the configured oracle backend can be built
//! 4. Serve the session API until `Ctrl-C`

use std::sync::Arc;

use anyhow::Context;
use sandbox_core::SandboxConfig;
use sandbox_core::config::LoggingConfig;
use sandbox_oracle::OracleBackend;
use sandbox_server::{AppState, start_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SandboxConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging);

    info!(
        backend = %config.oracle.backend,
        host = %config.server.host,
        port = config.server.port,
        grid_size = config.world.grid_size,
        num_agents = config.world.num_agents,
        player_agent = config.world.player_agent,
        "Configuration loaded"
    );

    let probe = OracleBackend::from_config(&config.oracle, config.world.seed)
        .context("oracle backend misconfigured")?;
    info!(backend = %probe.kind(), "Oracle backend ready");

    let server_config = config.server.clone();
    let state = Arc::new(AppState::new(config));
    start_server(&server_config, state)
        .await
        .context("server failed")?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
