//! OpenAI-compatible chat completions backend.
//!
//! Defaults target Qwen through DashScope's compatible mode; any endpoint that
//! speaks `/chat/completions` works with a different `base_url`.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tutorgrade_core::error::ProviderError;
use tutorgrade_core::traits::GradingClient;

use crate::http::{build_client, check_status, parse_error, send_error};

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_MODEL: &str = "qwen-turbo";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Client for an OpenAI-compatible endpoint.
pub struct OpenAiClient {
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(
        name: &str,
        api_key: &str,
        base_url: Option<String>,
        model: Option<String>,
        temperature: f64,
    ) -> Self {
        let client = build_client(DEFAULT_TIMEOUT_SECS);

        Self {
            name: name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
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
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl GradingClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, system, user), fields(backend = %self.name, model = %self.model))]
    async fn chat(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let response = check_status(response, &self.model).await?;
        let api_response: ChatResponse = response.json().await.map_err(parse_error)?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "chat completion received"
        );
        Ok(content)
    }
}
