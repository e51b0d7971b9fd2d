use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cli::config::ExtractorSettings;
use crate::utils::RequestTimer;

/// Model invocation errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Missing API key, unusable HTTP client settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("API error: {0}")]
    Api(String),

    /// Response body was not a completion
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Text-in, text-out access to the extraction model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

/// Client for an OpenAI-compatible `/completions` endpoint
/// (vLLM, llama.cpp server, TGI and similar hosts for the tuned model).
#[derive(Clone)]
pub struct CompletionClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl CompletionClient {
    pub fn new(settings: &ExtractorSettings) -> Result<Self, ModelError> {
        let api_key = match &settings.api_key_env {
            Some(var) => Some(std::env::var(var)
                .map_err(|_| ModelError::Config(format!("{} not set", var)))?),
            None => None,
        };

        let http_client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ModelError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    #[cfg(test)]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModel for CompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let timer = RequestTimer::start();

        let request = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut builder = self
            .http_client
            .post(format!("{}/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Completion request failed");
            ModelError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Completion API error");
            return Err(ModelError::Api(format!("{}: {}", status, error_text)));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| ModelError::Api("Completion had no choices".into()))?;

        debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            duration_ms = timer.end(),
            "Model completion"
        );

        Ok(text)
    }
}
