//! HTTP backends for hosted language models.
//!
//! Enum dispatch over an OpenAI-compatible chat completions backend and an
//! Anthropic Messages backend, both over `reqwest`. Each sends the rendered
//! system and user messages and returns the model's text untouched.

use sandbox_core::config::OracleConfig;

use crate::error::BackendError;
use crate::prompt::RenderedPrompt;

/// Base URL used by the `openai` backend when none is configured.
pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";

/// Base URL used by the `anthropic` backend when none is configured.
pub const ANTHROPIC_DEFAULT_URL: &str = "https://api.anthropic.com/v1";

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

/// Connection and sampling settings shared by both HTTP backends.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    /// Base URL, without a trailing path.
    pub api_url: String,
    /// Credential sent with every request.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl HttpSettings {
    /// Resolve settings from config, filling vendor defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if no API key is available.
    pub fn from_config(
        config: &OracleConfig,
        default_url: &str,
        default_model: &str,
    ) -> Result<Self, BackendError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            BackendError::Config(format!(
                "backend '{}' requires ORACLE_API_KEY to be set",
                config.backend
            ))
        })?;
        Ok(Self {
            api_url: config
                .api_url
                .as_deref()
                .unwrap_or(default_url)
                .trim_end_matches('/')
                .to_owned(),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_owned()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

/// A hosted model reached over HTTP.
pub enum HttpBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl HttpBackend {
    /// Build an OpenAI-compatible backend from config.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if no API key is available.
    pub fn openai(config: &OracleConfig) -> Result<Self, BackendError> {
        let settings =
            HttpSettings::from_config(config, OPENAI_DEFAULT_URL, OPENAI_DEFAULT_MODEL)?;
        Ok(Self::OpenAi(OpenAiBackend::new(settings)))
    }

    /// Build an Anthropic backend from config.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] if no API key is available.
    pub fn anthropic(config: &OracleConfig) -> Result<Self, BackendError> {
        let settings =
            HttpSettings::from_config(config, ANTHROPIC_DEFAULT_URL, ANTHROPIC_DEFAULT_MODEL)?;
        Ok(Self::Anthropic(AnthropicBackend::new(settings)))
    }

    /// Send a prompt and return the response text.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Http`] if the call fails or the response has
    /// no text content.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, BackendError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
        }
    }

    /// The settings this backend was built with.
    pub const fn settings(&self) -> &HttpSettings {
        match self {
            Self::OpenAi(backend) => &backend.settings,
            Self::Anthropic(backend) => &backend.settings,
        }
    }
}

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints.
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    settings: HttpSettings,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(settings: HttpSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.settings.api_url);

        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Http(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(BackendError::Http(format!(
                "OpenAI returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Http(format!("OpenAI response parse failed: {e}")))?;

        extract_openai_content(&json)
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, BackendError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            BackendError::Http("OpenAI response missing choices[0].message.content".to_owned())
        })
}

/// Backend for the Anthropic Messages API.
///
/// Anthropic differs from `OpenAI` in three places: the `x-api-key`
/// header, a top-level `system` field, and `content[0].text` replies.
pub struct AnthropicBackend {
    client: reqwest::Client,
    settings: HttpSettings,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(settings: HttpSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, BackendError> {
        let url = format!("{}/messages", self.settings.api_url);

        let body = serde_json::json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Http(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(BackendError::Http(format!(
                "Anthropic returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Http(format!("Anthropic response parse failed: {e}")))?;

        extract_anthropic_content(&json)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, BackendError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| BackendError::Http("Anthropic response missing content[0].text".to_owned()))
}
