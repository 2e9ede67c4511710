//! Error types for the oracle backends.
//!
//! Every call failure ends up as [`OracleError::Transport`] once it crosses
//! into the turn cycle; the variants here keep the cause readable in logs.

use sandbox_core::OracleError;

/// Errors that can occur while building or calling a backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend name or its settings are invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Failed to load or render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// An HTTP backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    Http(String),

    /// A CLI subprocess could not be run or reported a failure.
    #[error("CLI backend error: {0}")]
    Cli(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<BackendError> for OracleError {
    fn from(err: BackendError) -> Self {
        Self::Transport(err.to_string())
    }
}
