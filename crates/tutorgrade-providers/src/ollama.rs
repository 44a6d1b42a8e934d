//! Ollama (local LLM) backend.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tutorgrade_core::error::ProviderError;
use tutorgrade_core::traits::GradingClient;

use crate::http::{build_client, check_status, parse_error, send_error};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5";
const DEFAULT_TIMEOUT_SECS: u64 = 300; // Local models are slower

/// Ollama local LLM backend.
pub struct OllamaClient {
    name: String,
    base_url: String,
    model: String,
    temperature: f64,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(name: &str, base_url: &str, model: Option<String>, temperature: f64) -> Self {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };

        let client = build_client(DEFAULT_TIMEOUT_SECS);

        Self {
            name: name.to_string(),
            base_url: base.trim_end_matches('/').to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            client,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Replace the HTTP request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.client = build_client(secs);
        self.timeout_secs = secs;
        self
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: [OllamaMessage<'a>; 2],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[async_trait]
impl GradingClient for OllamaClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, system, user), fields(backend = %self.name, model = %self.model))]
    async fn chat(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let start = Instant::now();

        let body = OllamaRequest {
            model: &self.model,
            messages: [
                OllamaMessage {
                    role: "system",
                    content: system,
                },
                OllamaMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let response = check_status(response, &self.model).await?;
        let api_response: OllamaResponse = response.json().await.map_err(parse_error)?;

        if api_response.message.content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse.into());
        }

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            eval_count = api_response.eval_count.unwrap_or(0),
            "ollama reply received"
        );
        Ok(api_response.message.content)
    }
}
