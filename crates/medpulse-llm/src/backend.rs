//! LLM backend trait and concrete implementations.
//!
//! Backends:
//!   GeminiBackend            Google Gemini API (default: gemini-2.0-flash)
//!   OpenAiCompatibleBackend  OpenAI or any OpenAI-compatible endpoint
//!                             (Ollama, LM Studio, vLLM, OpenRouter, …)
//!   AnthropicBackend         Anthropic Messages API (claude-*)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const GEMINI_BASE_URL: &str    = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str    = "https://api.openai.com";
const OLLAMA_BASE_URL: &str    = "http://localhost:11434";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("Completion contained no text")]
    EmptyCompletion,
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the provider for a bare JSON body where it supports that.
    pub json_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    fn model_id(&self) -> &str;
    fn provider(&self) -> &'static str;
}

// ── Construction from config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    OpenAiCompatible,
    Ollama,
    Anthropic,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Gemini           => "gemini",
            BackendKind::OpenAi           => "openai",
            BackendKind::OpenAiCompatible => "openai_compatible",
            BackendKind::Ollama           => "ollama",
            BackendKind::Anthropic        => "anthropic",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, BackendKind::Gemini | BackendKind::OpenAi | BackendKind::Anthropic)
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

pub fn build_backend(cfg: BackendConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let api_key = cfg.api_key.filter(|k| !k.trim().is_empty());
    if cfg.kind.requires_api_key() && api_key.is_none() {
        return Err(LlmError::Unavailable(format!(
            "no API key configured for {}",
            cfg.kind.as_str()
        )));
    }
    let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
    let key = api_key.clone().unwrap_or_default();

    let backend: Arc<dyn LlmBackend> = match cfg.kind {
        BackendKind::Gemini => Arc::new(GeminiBackend {
            base_url: cfg.base_url.unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            model: cfg.model,
            api_key: key,
            client,
        }),
        BackendKind::OpenAi | BackendKind::OpenAiCompatible | BackendKind::Ollama => {
            let default_base = match cfg.kind {
                BackendKind::Ollama => OLLAMA_BASE_URL,
                _ => OPENAI_BASE_URL,
            };
            Arc::new(OpenAiCompatibleBackend {
                base_url: cfg.base_url.unwrap_or_else(|| default_base.to_string()),
                model: cfg.model,
                api_key,
                client,
            })
        }
        BackendKind::Anthropic => Arc::new(AnthropicBackend {
            base_url: cfg.base_url.unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string()),
            model: cfg.model,
            api_key: key,
            client,
        }),
    };
    Ok(backend)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    if status == 429 {
        return Err(LlmError::RateLimitExceeded);
    }
    let text = resp.text().await?;
    if status >= 400 {
        let body: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        let message = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .map(String::from)
            .unwrap_or_else(|| text.chars().take(200).collect());
        return Err(LlmError::ApiError { status, message });
    }
    Ok(serde_json::from_str(&text)?)
}

fn non_empty(content: Option<&str>) -> Result<String, LlmError> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(LlmError::EmptyCompletion),
    }
}

fn token_count(v: &serde_json::Value) -> u32 {
    v.as_u64().unwrap_or(0) as u32
}

// ── 1. Google Gemini ──────────────────────────────────────────────────────────

pub struct GeminiBackend {
    pub base_url: String,
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = req.model.as_deref().unwrap_or(&self.model);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );

        // System message → systemInstruction, the rest → contents
        let system_text = req.messages.iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone());

        let contents: Vec<serde_json::Value> = req.messages.iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                serde_json::json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut generation_config = serde_json::json!({
            "maxOutputTokens": req.max_tokens.unwrap_or(4096),
            "temperature":     req.temperature.unwrap_or(0.7),
        });
        if req.json_mode {
            generation_config["responseMimeType"] = "application/json".into();
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(sys) = system_text {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": sys }] });
        }

        let resp = self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        let content = non_empty(json["candidates"][0]["content"]["parts"][0]["text"].as_str())?;

        Ok(LlmResponse {
            content,
            model: model.to_string(),
            prompt_tokens:     token_count(&json["usageMetadata"]["promptTokenCount"]),
            completion_tokens: token_count(&json["usageMetadata"]["candidatesTokenCount"]),
        })
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> &'static str { "gemini" }
}

// ── 2. OpenAI-Compatible (OpenAI, Ollama, LM Studio, vLLM, …) ────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None    => req,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let model = req.model.as_deref().unwrap_or(&self.model);
        let body = serde_json::json!({
            "model":       model,
            "messages":    req.messages,
            "max_tokens":  req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.7),
        });
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;

        Ok(LlmResponse {
            content: non_empty(json["choices"][0]["message"]["content"].as_str())?,
            model: json["model"].as_str().unwrap_or(model).to_string(),
            prompt_tokens:     token_count(&json["usage"]["prompt_tokens"]),
            completion_tokens: token_count(&json["usage"]["completion_tokens"]),
        })
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> &'static str { "openai_compatible" }
}

// ── 3. Anthropic (claude-*) ───────────────────────────────────────────────────

pub struct AnthropicBackend {
    pub base_url: String,
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: ANTHROPIC_BASE_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        // Messages API takes the system prompt separately
        let system = req.messages.iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let messages: Vec<serde_json::Value> = req.messages.iter()
            .filter(|m| m.role != "system")
            .map(|m| serde_json::json!({"role": m.role, "content": m.content}))
            .collect();

        let model = req.model.as_deref().unwrap_or(&self.model);
        let mut body = serde_json::json!({
            "model":       model,
            "messages":    messages,
            "max_tokens":  req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.7),
        });
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system.to_string());
        }

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let resp = self.client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;

        let text = json["content"]
            .as_array()
            .and_then(|blocks| blocks.iter().find(|b| b["type"] == "text"))
            .and_then(|b| b["text"].as_str());

        Ok(LlmResponse {
            content: non_empty(text)?,
            model: json["model"].as_str().unwrap_or(model).to_string(),
            prompt_tokens:     token_count(&json["usage"]["input_tokens"]),
            completion_tokens: token_count(&json["usage"]["output_tokens"]),
        })
    }

    fn model_id(&self) -> &str { &self.model }
    fn provider(&self) -> &'static str { "anthropic" }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(kind: BackendKind, api_key: Option<&str>) -> BackendConfig {
        BackendConfig {
            kind,
            model: "m".to_string(),
            api_key: api_key.map(String::from),
            base_url: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_gemini_requires_key() {
        let err = build_backend(cfg(BackendKind::Gemini, None)).err().unwrap();
        assert!(matches!(err, LlmError::Unavailable(_)));
        let err = build_backend(cfg(BackendKind::Gemini, Some("  "))).err().unwrap();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let b = build_backend(cfg(BackendKind::Ollama, None)).unwrap();
        assert_eq!(b.provider(), "openai_compatible");
        assert_eq!(b.model_id(), "m");
    }

    #[test]
    fn test_backend_kind_serde() {
        let kind: BackendKind = serde_json::from_str("\"openai_compatible\"").unwrap();
        assert_eq!(kind, BackendKind::OpenAiCompatible);
        assert_eq!(BackendKind::Anthropic.as_str(), "anthropic");
    }

    #[test]
    fn test_gemini_backend_model() {
        let b = GeminiBackend::new("AIza-test", "gemini-2.0-flash");
        assert_eq!(b.model_id(), "gemini-2.0-flash");
        assert_eq!(b.provider(), "gemini");
    }
}
