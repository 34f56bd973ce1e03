//! LM capability: an injectable completion interface with two bindings.
//!
//! The pipeline only ever sees [`LmClient`]. Production resolves either the
//! Gemini HTTP backend or a user-configured subprocess command; tests inject
//! deterministic stubs. Credentials and model names are read once at
//! resolution time, never from ambient process state inside pipeline stages.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Environment override selecting the subprocess backend.
pub const LM_COMMAND_ENV: &str = "APISCOUT_LM_COMMAND";
/// Credential for the Gemini backend; absence is a fatal configuration error.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Model override for the Gemini backend.
pub const GEMINI_MODEL_ENV: &str = "GEMINI_MODEL";

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Single-call text completion returning a JSON-parseable response body.
pub trait LmClient {
    fn complete(&self, system: Option<&str>, user: &str, temperature: f32) -> Result<String>;
}

/// Resolve the production backend.
///
/// Priority: explicit `--lm-command`, then [`LM_COMMAND_ENV`], then Gemini
/// with [`GEMINI_API_KEY_ENV`]. This is the only place the process
/// environment is consulted.
pub fn resolve_client(
    lm_command: Option<&str>,
    model: Option<&str>,
) -> Result<Box<dyn LmClient>> {
    if let Some(command) = lm_command {
        return Ok(Box::new(CommandClient::new(command)?));
    }
    if let Ok(command) = env::var(LM_COMMAND_ENV) {
        return Ok(Box::new(CommandClient::new(&command)?));
    }

    let api_key = env::var(GEMINI_API_KEY_ENV)
        .map_err(|_| anyhow!("{GEMINI_API_KEY_ENV} not set"))?;
    let model = model
        .map(str::to_string)
        .or_else(|| env::var(GEMINI_MODEL_ENV).ok())
        .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
    Ok(Box::new(GeminiClient::new(GeminiConfig { api_key, model })))
}

/// Run a completion and recover a JSON value from its text.
pub fn complete_json(
    client: &dyn LmClient,
    system: Option<&str>,
    user: &str,
    temperature: f32,
) -> Result<Value> {
    let response = client.complete(system, user, temperature)?;
    recover_json(&response).map_err(|err| anyhow!("{err}"))
}

// ---------------------------------------------------------------------------
// Gemini HTTP backend

/// Explicit configuration handed to [`GeminiClient`] at construction time.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

pub struct GeminiClient {
    config: GeminiConfig,
    agent: ureq::Agent,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        // Non-2xx responses carry a JSON error envelope worth surfacing,
        // so status handling stays manual.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        GeminiClient { config, agent }
    }
}

impl LmClient for GeminiClient {
    fn complete(&self, system: Option<&str>, user: &str, temperature: f32) -> Result<String> {
        let url = format!(
            "{GEMINI_BASE_URL}/models/{}:generateContent",
            self.config.model
        );
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: user.to_string(),
                }],
            }],
            system_instruction: system.map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature,
                response_mime_type: "application/json",
            },
        };

        let started = Instant::now();
        let mut response = self
            .agent
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .send_json(&request)
            .context("send Gemini request")?;
        let status = response.status();

        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            let detail = serde_json::from_str::<GeminiErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(anyhow!(
                "Gemini request failed with status {status}: {}",
                detail.trim()
            ));
        }

        let parsed: GeminiResponse = response
            .body_mut()
            .read_json()
            .context("decode Gemini response")?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        tracing::info!(
            model = %self.config.model,
            elapsed_ms = started.elapsed().as_millis(),
            prompt_bytes = user.len(),
            response_bytes = text.len(),
            "gemini completion"
        );

        if text.is_empty() {
            // An empty candidate downstream means an empty plan, not a crash.
            return Ok("{}".to_string());
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

// ---------------------------------------------------------------------------
// Subprocess backend

/// Backend that pipes the prompt to a user-configured command.
///
/// The command may embed a `{prompt}` placeholder; otherwise the prompt is
/// written to stdin. The system instruction is prepended to the user payload
/// since a generic subprocess has no separate system channel.
pub struct CommandClient {
    argv: Vec<String>,
}

impl CommandClient {
    pub fn new(command: &str) -> Result<Self> {
        let argv = shell_words::split(command)
            .with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(CommandClient { argv })
    }
}

impl LmClient for CommandClient {
    fn complete(&self, system: Option<&str>, user: &str, _temperature: f32) -> Result<String> {
        let prompt = match system {
            Some(system) => format!("{system}\n\n{user}"),
            None => user.to_string(),
        };

        let mut argv = self.argv.clone();
        let mut has_placeholder = false;
        for arg in &mut argv {
            if arg == "{prompt}" {
                *arg = prompt.clone();
                has_placeholder = true;
            }
        }

        let program = argv.remove(0);
        let mut command = Command::new(&program);
        command.args(&argv);
        if has_placeholder {
            command.stdin(Stdio::null());
        } else {
            command.stdin(Stdio::piped());
        }
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let started = Instant::now();
        let output = if has_placeholder {
            command
                .output()
                .with_context(|| format!("run LM command: {program}"))?
        } else {
            let mut child = command
                .spawn()
                .with_context(|| format!("spawn LM command: {program}"))?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(prompt.as_bytes())
                    .context("write LM prompt")?;
            }
            child.wait_with_output().context("wait LM output")?
        };

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis(),
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm command completion"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("LM command failed: {}", stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ---------------------------------------------------------------------------
// JSON recovery

/// Failure to recover any JSON value from an LM response.
#[derive(Debug)]
pub struct JsonRecoveryError {
    preview: String,
}

impl fmt::Display for JsonRecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LM response was not JSON-recoverable (starts with: {})",
            self.preview
        )
    }
}

impl std::error::Error for JsonRecoveryError {}

/// Two-stage recovery: strict parse of the fence-stripped text, then a scan
/// for the first balanced top-level object or array.
pub fn recover_json(raw: &str) -> Result<Value, JsonRecoveryError> {
    let cleaned = strip_code_fences(raw);
    if let Ok(value) = serde_json::from_str(&cleaned) {
        return Ok(value);
    }
    if let Some(value) = scan_balanced_json(&cleaned) {
        return Ok(value);
    }
    let preview: String = cleaned.chars().take(120).collect();
    Err(JsonRecoveryError { preview })
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if let Some(first) = lines.first() {
        if first.trim_start().starts_with("```") {
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if last.trim_start().starts_with("```") {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// Try a self-terminating parse at every `{` or `[`; the first success is the
/// first balanced top-level value in the text.
fn scan_balanced_json(raw: &str) -> Option<Value> {
    for (idx, ch) in raw.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(&raw[idx..]);
        if let Ok(value) = Value::deserialize(&mut deserializer) {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod testing {
    use super::LmClient;
    use anyhow::{anyhow, Result};
    use std::cell::RefCell;

    /// Deterministic stub returning scripted replies in order.
    pub(crate) struct ScriptedLm {
        replies: RefCell<Vec<String>>,
        pub(crate) calls: RefCell<Vec<String>>,
    }

    impl ScriptedLm {
        pub(crate) fn new<S: Into<String>>(replies: Vec<S>) -> Self {
            ScriptedLm {
                replies: RefCell::new(replies.into_iter().map(Into::into).collect()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl LmClient for ScriptedLm {
        fn complete(
            &self,
            _system: Option<&str>,
            user: &str,
            _temperature: f32,
        ) -> Result<String> {
            self.calls.borrow_mut().push(user.to_string());
            let mut replies = self.replies.borrow_mut();
            if replies.is_empty() {
                return Err(anyhow!("scripted LM exhausted"));
            }
            Ok(replies.remove(0))
        }
    }
}
