//! HTTP backend for Ollama-compatible model servers
//!
//! Posts non-streaming requests to `{base_url}/api/generate` at temperature 0
//! and returns the `response` field.

use crate::service::{CompletionError, CompletionService};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default system instruction: reply with bare JSON
pub const JSON_ONLY_SYSTEM: &str =
    "You are a careful reliability reviewer. Respond with valid JSON only. No markdown, no explanation.";

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Server root, e.g. `http://localhost:11434`
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Max tokens to generate
    pub max_tokens: u32,
    /// System instruction sent with every prompt
    pub system_prompt: Option<String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.0,
            max_tokens: 2_000,
            system_prompt: Some(JSON_ONLY_SYSTEM.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama `/api/generate` client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    /// Create a client
    ///
    /// # Errors
    /// [`CompletionError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(config: OllamaConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CompletionError::Unavailable(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Connection settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Probe `/api/tags`; true when the server answers 200
    pub async fn check_health(&self) -> bool {
        match self
            .http
            .get(self.url("api/tags"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                tracing::warn!("completion backend health probe failed: {err}");
                false
            }
        }
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, CompletionError> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            system: self.config.system_prompt.as_deref(),
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self
            .http
            .post(self.url("api/generate"))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CompletionError::Unavailable(format!("HTTP {status}: {text}")));
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;
        Ok(reply.response)
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

fn classify(err: &reqwest::Error, timeout: Duration) -> CompletionError {
    if err.is_timeout() {
        CompletionError::timeout(timeout)
    } else {
        CompletionError::Unavailable(err.to_string())
    }
}
