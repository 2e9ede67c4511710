//! The configured decision backend.
//!
//! [`OracleBackend`] is what the server plugs into a simulation. It is an
//! enum rather than a trait object because [`Oracle::decide`] is async.
//! Remote backends render a prompt from the observation, send it, and
//! return the raw reply.

use core::fmt;
use core::str::FromStr;

use sandbox_core::config::OracleConfig;
use sandbox_core::{Oracle, OracleError};
use sandbox_types::Observation;
use tracing::{debug, info};

use crate::cli::{CliBackend, CliTool};
use crate::error::BackendError;
use crate::llm::HttpBackend;
use crate::mock::MockOracle;
use crate::prompt::PromptEngine;

/// Supported backend names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Seeded random pick from the legal set.
    Mock,
    /// Gemini CLI subprocess.
    Gemini,
    /// Codex CLI subprocess.
    Codex,
    /// OpenAI-compatible chat completions over HTTP.
    OpenAi,
    /// Anthropic Messages over HTTP.
    Anthropic,
}

impl BackendKind {
    /// The configuration name of this backend.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Gemini => "gemini",
            Self::Codex => "codex",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "gemini" => Ok(Self::Gemini),
            "codex" => Ok(Self::Codex),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(BackendError::Config(format!(
                "unknown oracle backend '{other}' (expected mock, gemini, codex, openai, or anthropic)"
            ))),
        }
    }
}

/// How a remote backend delivers the prompt.
pub enum Transport {
    /// Flattened prompt passed to a CLI tool.
    Cli(CliBackend),
    /// System and user messages sent over HTTP.
    Http(HttpBackend),
}

/// A prompt-driven backend: CLI or HTTP.
pub struct RemoteOracle {
    kind: BackendKind,
    prompts: PromptEngine,
    transport: Transport,
    debug: bool,
}

impl RemoteOracle {
    async fn complete(&self, observation: &Observation) -> Result<String, BackendError> {
        let prompt = self.prompts.render(observation)?;
        if self.debug {
            info!(
                backend = %self.kind,
                agent = %observation.you,
                turn = observation.turn,
                system = %prompt.system,
                user = %prompt.user,
                "Oracle prompt"
            );
        }

        let reply = match &self.transport {
            Transport::Cli(cli) => cli.complete(&prompt.flatten()).await?,
            Transport::Http(http) => http.complete(&prompt).await?,
        };

        if self.debug {
            info!(backend = %self.kind, agent = %observation.you, reply = %reply, "Oracle reply");
        } else {
            debug!(backend = %self.kind, agent = %observation.you, len = reply.len(), "Oracle reply");
        }
        Ok(reply)
    }
}

/// The decision backend selected by configuration.
pub enum OracleBackend {
    /// In-process random choices.
    Mock(MockOracle),
    /// A CLI or HTTP model.
    Remote(RemoteOracle),
}

impl OracleBackend {
    /// Build the backend named by `config.backend`.
    ///
    /// `seed` seeds the mock backend and is ignored by the others.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] for an unknown backend name or a
    /// missing API key, and [`BackendError::Template`] if prompt template
    /// overrides fail to load.
    pub fn from_config(config: &OracleConfig, seed: Option<u64>) -> Result<Self, BackendError> {
        let kind: BackendKind = config.backend.parse()?;
        let transport = match kind {
            BackendKind::Mock => return Ok(Self::Mock(MockOracle::new(seed))),
            BackendKind::Gemini => Transport::Cli(CliBackend::new(
                CliTool::Gemini,
                config.cli_path.clone(),
                config.model.clone(),
                config.debug,
            )),
            BackendKind::Codex => Transport::Cli(CliBackend::new(
                CliTool::Codex,
                config.cli_path.clone(),
                config.model.clone(),
                config.debug,
            )),
            BackendKind::OpenAi => Transport::Http(HttpBackend::openai(config)?),
            BackendKind::Anthropic => Transport::Http(HttpBackend::anthropic(config)?),
        };
        Ok(Self::Remote(RemoteOracle {
            kind,
            prompts: PromptEngine::new(config.templates_dir.as_deref())?,
            transport,
            debug: config.debug,
        }))
    }

    /// Which backend this is.
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Mock(_) => BackendKind::Mock,
            Self::Remote(remote) => remote.kind,
        }
    }
}

impl Oracle for OracleBackend {
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    async fn decide(&mut self, observation: &Observation) -> Result<String, OracleError> {
        match self {
            Self::Mock(mock) => mock.decide(observation).await,
            Self::Remote(remote) => remote.complete(observation).await.map_err(OracleError::from),
        }
    }
}
