//! Configuration loading and typed config structures for the sandbox.
//!
//! The configuration lives in `sandbox-config.yaml` at the project root.
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working mock-backed server on port 8000.
//!
//! Environment variables take precedence over the file:
//! - `SANDBOX_CONFIG` selects the file path
//! - `SANDBOX_PORT` overrides `server.port`
//! - `SANDBOX_ORACLE_BACKEND` overrides `oracle.backend`
//! - `ORACLE_API_KEY` supplies credentials for the HTTP oracle backends

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "sandbox-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level sandbox configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SandboxConfig {
    /// Defaults for session resets.
    #[serde(default)]
    pub world: WorldConfig,

    /// Decision oracle backend settings.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SandboxConfig {
    /// Load the configuration the server should run with.
    ///
    /// Reads the file named by `SANDBOX_CONFIG` (or
    /// [`DEFAULT_CONFIG_PATH`]); a missing file means all defaults. The
    /// environment overrides are then applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SANDBOX_CONFIG")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override file values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SANDBOX_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!(value = %val, error = %e, "ignoring invalid SANDBOX_PORT"),
            }
        }
        if let Ok(val) = std::env::var("SANDBOX_ORACLE_BACKEND") {
            self.oracle.backend = val;
        }
        if let Ok(val) = std::env::var("ORACLE_API_KEY") {
            self.oracle.api_key = Some(val);
        }
    }
}

/// Defaults applied to resets that omit a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Side length of the square grid.
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,

    /// Number of agents, including the interactive one.
    #[serde(default = "default_num_agents")]
    pub num_agents: usize,

    /// Placement and mock-oracle seed. Unseeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Whether the last agent is controlled by the player.
    #[serde(default)]
    pub player_agent: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            num_agents: default_num_agents(),
            seed: None,
            player_agent: false,
        }
    }
}

/// Decision oracle backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OracleConfig {
    /// Backend name: `mock`, `gemini`, `codex`, `openai`, or `anthropic`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Model name passed to the backend. Backend default when absent.
    #[serde(default)]
    pub model: Option<String>,

    /// Base URL for the HTTP backends. Vendor default when absent.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Executable for the CLI backends. `gemini` or `codex` when absent.
    #[serde(default)]
    pub cli_path: Option<String>,

    /// Maximum tokens requested from the HTTP backends.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for the HTTP backends.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Directory with `system.j2` / `decision.j2` overriding the built-in
    /// prompt templates.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    /// Log full prompts and raw replies at `info` level.
    #[serde(default)]
    pub debug: bool,

    /// API key for the HTTP backends. Only read from `ORACLE_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: None,
            api_url: None,
            cli_path: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            templates_dir: None,
            debug: false,
            api_key: None,
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_grid_size() -> u32 {
    3
}

const fn default_num_agents() -> usize {
    2
}

fn default_backend() -> String {
    String::from("mock")
}

const fn default_max_tokens() -> u32 {
    256
}

const fn default_temperature() -> f32 {
    0.7
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SandboxConfig::default();
        assert_eq!(config.world.grid_size, 3);
        assert_eq!(config.world.num_agents, 2);
        assert!(!config.world.player_agent);
        assert_eq!(config.oracle.backend, "mock");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  grid_size: 5
  num_agents: 3
  seed: 11
  player_agent: true

oracle:
  backend: "openai"
  model: "gpt-4o-mini"
  api_url: "http://localhost:9000/v1"
  max_tokens: 128
  temperature: 0.2
  templates_dir: "templates"
  debug: true

server:
  host: "127.0.0.1"
  port: 9001

logging:
  level: "debug"
  json: true
"#;
        let config = SandboxConfig::parse(yaml).unwrap();
        assert_eq!(config.world.grid_size, 5);
        assert_eq!(config.world.seed, Some(11));
        assert!(config.world.player_agent);
        assert_eq!(config.oracle.backend, "openai");
        assert_eq!(config.oracle.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.oracle.max_tokens, 128);
        assert_eq!(config.oracle.templates_dir, Some(PathBuf::from("templates")));
        assert!(config.oracle.debug);
        assert!(config.oracle.api_key.is_none());
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9001);
        assert!(config.logging.json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SandboxConfig::parse("world:\n  seed: 7\n").unwrap();
        assert_eq!(config.world.seed, Some(7));
        assert_eq!(config.world.grid_size, 3);
        assert_eq!(config.oracle.backend, "mock");
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(SandboxConfig::parse("").is_ok());
    }

    #[test]
    fn parse_garbage_is_an_error() {
        let result = SandboxConfig::parse("world: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(DEFAULT_CONFIG_PATH);
        if path.exists() {
            let config = SandboxConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
