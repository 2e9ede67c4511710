//! CLI subprocess backends.
//!
//! The Gemini and Codex command-line tools are run once per decision with
//! the flattened prompt as an argument. Each tool wraps its answer in its
//! own JSON envelope; the parsers here pull the model text back out.

use serde_json::Value;
use tokio::process::Command;
use tracing::info;

use crate::error::BackendError;

const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";
const PREVIEW_CHARS: usize = 200;

/// Which command-line tool to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliTool {
    /// `gemini -m <model> -p <prompt> -o json`
    Gemini,
    /// `codex exec --json [-m <model>] <prompt>`
    Codex,
}

impl CliTool {
    /// Executable name used when no `cli_path` is configured.
    pub const fn default_program(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Codex => "codex",
        }
    }
}

/// A CLI tool invocation template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliBackend {
    tool: CliTool,
    program: String,
    model: Option<String>,
    debug: bool,
}

impl CliBackend {
    /// Create a backend for `tool`, run as `program`.
    ///
    /// Gemini falls back to its default model when `model` is `None`; Codex
    /// leaves model selection to the tool.
    pub fn new(tool: CliTool, program: Option<String>, model: Option<String>, debug: bool) -> Self {
        let model = match tool {
            CliTool::Gemini => Some(model.unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_owned())),
            CliTool::Codex => model,
        };
        Self {
            tool,
            program: program.unwrap_or_else(|| tool.default_program().to_owned()),
            model,
            debug,
        }
    }

    /// The tool this backend drives.
    pub const fn tool(&self) -> CliTool {
        self.tool
    }

    /// Arguments passed to the program for `prompt`.
    pub fn args(&self, prompt: &str) -> Vec<String> {
        let mut args = Vec::new();
        match self.tool {
            CliTool::Gemini => {
                if let Some(model) = &self.model {
                    args.extend([String::from("-m"), model.clone()]);
                }
                args.extend([
                    String::from("-p"),
                    prompt.to_owned(),
                    String::from("-o"),
                    String::from("json"),
                ]);
            }
            CliTool::Codex => {
                args.extend([String::from("exec"), String::from("--json")]);
                if let Some(model) = &self.model {
                    args.extend([String::from("-m"), model.clone()]);
                }
                args.push(prompt.to_owned());
            }
        }
        args
    }

    /// Run the tool on `prompt` and return the extracted model text.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Cli`] if the program cannot be spawned, exits
    /// unsuccessfully, or reports an error in its output.
    pub async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        if self.debug {
            info!(
                program = %self.program,
                model = ?self.model,
                prompt_preview = %preview(prompt),
                "Running oracle CLI"
            );
        }

        let output = Command::new(&self.program)
            .args(self.args(prompt))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BackendError::Cli(format!("failed to run {}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if self.debug {
            info!(
                status = %output.status,
                stdout = %stdout.trim(),
                stderr = %stderr.trim(),
                "Oracle CLI finished"
            );
        }

        if !output.status.success() {
            let detail = if !stderr.trim().is_empty() {
                stderr.trim().to_owned()
            } else if !stdout.trim().is_empty() {
                stdout.trim().to_owned()
            } else {
                output.status.code().map_or_else(
                    || String::from("CLI terminated by signal"),
                    |code| format!("CLI exited with {code}"),
                )
            };
            return Err(BackendError::Cli(detail));
        }

        match self.tool {
            CliTool::Gemini => parse_gemini_output(&stdout),
            CliTool::Codex => parse_codex_output(&stdout, &stderr),
        }
    }
}

/// Extract the model text from `gemini -o json` output.
///
/// The envelope is checked for an `error` key and for non-zero
/// `stats.models.*.api.totalErrors`. Text is taken from the first
/// candidate, then from `output` / `text` / `response`, and otherwise the
/// raw output is returned as-is.
///
/// # Errors
///
/// Returns [`BackendError::Cli`] if the envelope reports an error.
pub fn parse_gemini_output(stdout: &str) -> Result<String, BackendError> {
    let trimmed = stdout.trim();
    let envelope: Value = serde_json::from_str(trimmed).unwrap_or(Value::Null);

    if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
        return Err(BackendError::Cli(format!("Gemini CLI error: {error}")));
    }
    let api_errors: u64 = envelope
        .pointer("/stats/models")
        .and_then(Value::as_object)
        .map_or(0, |models| {
            models
                .values()
                .filter_map(|m| m.pointer("/api/totalErrors").and_then(Value::as_u64))
                .fold(0_u64, u64::saturating_add)
        });
    if api_errors > 0 {
        return Err(BackendError::Cli(format!(
            "Gemini CLI reported {api_errors} API error(s)"
        )));
    }

    if let Some(candidate) = envelope.pointer("/candidates/0") {
        let mut parts = Vec::new();
        collect_text(candidate, &mut parts);
        let text = parts.join("").trim().to_owned();
        if !text.is_empty() {
            return Ok(text);
        }
    }

    for key in ["output", "text", "response"] {
        if let Some(text) = envelope.get(key).and_then(Value::as_str) {
            return Ok(text.trim().to_owned());
        }
    }

    Ok(trimmed.to_owned())
}

/// Gather text from nested `text` / `parts` / `content` fields.
fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect_text(item, out);
            }
        }
        Value::Object(map) => {
            for key in ["text", "parts", "content"] {
                if let Some(inner) = map.get(key) {
                    collect_text(inner, out);
                }
            }
        }
        _ => {}
    }
}

/// Extract the model text from `codex exec --json` output.
///
/// The output is JSON lines; every `item` whose `type` is `agent_message`
/// contributes its `text`. Output without such lines is returned as-is.
///
/// # Errors
///
/// Returns [`BackendError::Cli`] if stdout is empty while stderr is not.
pub fn parse_codex_output(stdout: &str, stderr: &str) -> Result<String, BackendError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        if stderr.trim().is_empty() {
            return Ok(String::new());
        }
        return Err(BackendError::Cli(format!(
            "Codex CLI produced no output: {}",
            stderr.trim()
        )));
    }

    let messages: Vec<String> = trimmed
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .filter_map(|event| {
            let item = event.get("item")?;
            if item.get("type").and_then(Value::as_str) != Some("agent_message") {
                return None;
            }
            item.get("text")
                .and_then(Value::as_str)
                .map(|text| text.trim().to_owned())
        })
        .collect();

    if messages.is_empty() {
        Ok(trimmed.to_owned())
    } else {
        Ok(messages.join("\n"))
    }
}

fn preview(prompt: &str) -> String {
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
