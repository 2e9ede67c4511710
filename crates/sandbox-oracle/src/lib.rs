//! Decision oracle backends for the sandbox simulation.
//!
//! Each backend implements [`sandbox_core::Oracle`]: given an agent's
//! observation it returns free-form text that the turn cycle decodes into
//! an action. Backends never interpret replies themselves.
//!
//! # Modules
//!
//! - [`backend`] -- [`OracleBackend`], the configured backend behind the
//!   oracle trait, and [`BackendKind`].
//! - [`cli`] -- Gemini and Codex CLI subprocess backends and their output
//!   parsers.
//! - [`error`] -- Error types for backend construction and calls.
//! - [`llm`] -- OpenAI-compatible and Anthropic HTTP backends.
//! - [`mock`] -- [`MockOracle`], a seeded random pick from the legal set.
//! - [`prompt`] -- `minijinja` prompt rendering from observations.
//!
//! [`OracleBackend`]: backend::OracleBackend
//! [`BackendKind`]: backend::BackendKind
//! [`MockOracle`]: mock::MockOracle

pub mod backend;
pub mod cli;
pub mod error;
pub mod llm;
pub mod mock;
pub mod prompt;

pub use backend::{BackendKind, OracleBackend};
pub use error::BackendError;
pub use mock::MockOracle;
