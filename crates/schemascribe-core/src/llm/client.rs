//! # LLM API Client
//!
//! Sends description prompts to Claude or OpenAI and returns the raw
//! response text. The API key is auto-detected from environment variables
//! and the model can be overridden via `--model` or `[llm] model`.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use crate::error::{Result, ScribeError};

const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Anything that turns a prompt into text.
///
/// Implementations must be shareable across worker tasks: the enrichment
/// executor calls `generate` concurrently on one instance.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Hosted chat models the CLI can talk to.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Claude { api_key: String, model: String },
    OpenAI { api_key: String, model: String },
}

impl LlmProvider {
    /// Auto-detect provider from environment variables.
    ///
    /// Checks `ANTHROPIC_API_KEY` first, then `OPENAI_API_KEY`. When both
    /// are set and the model override names an OpenAI model (`gpt-*`,
    /// `o1-*`, ...) OpenAI is used instead.
    pub fn from_env(model_override: Option<&str>) -> Result<Self> {
        let anthropic = std::env::var("ANTHROPIC_API_KEY").ok();
        let openai = std::env::var("OPENAI_API_KEY").ok();

        let wants_openai = model_override.is_some_and(is_openai_model);

        match (anthropic, openai) {
            (_, Some(key)) if wants_openai => Ok(LlmProvider::OpenAI {
                api_key: key,
                model: model_override.unwrap_or(DEFAULT_OPENAI_MODEL).to_string(),
            }),
            (Some(key), _) => Ok(LlmProvider::Claude {
                api_key: key,
                model: model_override.unwrap_or(DEFAULT_CLAUDE_MODEL).to_string(),
            }),
            (None, Some(key)) => Ok(LlmProvider::OpenAI {
                api_key: key,
                model: model_override.unwrap_or(DEFAULT_OPENAI_MODEL).to_string(),
            }),
            (None, None) => Err(ScribeError::Llm {
                message: "No LLM API key found. Set ANTHROPIC_API_KEY or OPENAI_API_KEY environment variable.".to_string(),
            }),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LlmProvider::Claude { model, .. } | LlmProvider::OpenAI { model, .. } => model,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            LlmProvider::Claude { .. } => "claude",
            LlmProvider::OpenAI { .. } => "openai",
        }
    }
}

impl TextGenerator for LlmProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            LlmProvider::Claude { api_key, model } => call_claude(api_key, model, prompt).await,
            LlmProvider::OpenAI { api_key, model } => call_openai(api_key, model, prompt).await,
        }
    }
}

fn is_openai_model(model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    ["gpt", "o1", "o3", "o4", "chatgpt"]
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

const API_TIMEOUT: Duration = Duration::from_secs(45);

/// Longest slice of an error body kept in `ScribeError::Llm` messages.
const ERROR_BODY_LIMIT: usize = 500;

/// One connection pool for every worker; chunk requests share it.
static HTTP: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(API_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Single-turn, temperature 0 chat body shared by both APIs.
fn chat_body(model: &str, prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "temperature": 0,
        "messages": [{ "role": "user", "content": prompt }],
    })
}

/// Send `body` and decode the JSON reply, mapping transport, status and
/// decode failures to `ScribeError::Llm` labelled with `api`.
async fn send_json(
    api: &str,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let llm_error = |message: String| ScribeError::Llm { message };

    let response = request
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| llm_error(format!("{} request failed: {}", api, e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| llm_error(format!("{} response could not be read: {}", api, e)))?;
    if !status.is_success() {
        return Err(llm_error(format!(
            "{} returned {}: {}",
            api,
            status,
            truncate(&text, ERROR_BODY_LIMIT)
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| llm_error(format!("{} response is not JSON: {}", api, e)))
}

/// Anthropic Messages API. No assistant pre-fill: the same call serves
/// free-text table descriptions and JSON field arrays.
async fn call_claude(api_key: &str, model: &str, prompt: &str) -> Result<String> {
    let mut body = chat_body(model, prompt);
    body["max_tokens"] = serde_json::json!(8192);

    let request = HTTP
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01");
    let reply = send_json("Claude API", request, &body).await?;

    reply["content"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ScribeError::Llm {
            message: "Claude API reply has no content[0].text".to_string(),
        })
}

/// OpenAI Chat Completions API.
async fn call_openai(api_key: &str, model: &str, prompt: &str) -> Result<String> {
    let body = chat_body(model, prompt);
    let request = HTTP
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(api_key);
    let reply = send_json("OpenAI API", request, &body).await?;

    reply["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ScribeError::Llm {
            message: "OpenAI API reply has no choices[0].message.content".to_string(),
        })
}

/// First `max` characters of `s`, never splitting a code point.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
