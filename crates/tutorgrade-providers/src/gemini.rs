//! Google Gemini backend using the native `generateContent` API.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tutorgrade_core::error::ProviderError;
use tutorgrade_core::traits::GradingClient;

use crate::http::{build_client, check_status, parse_error, send_error};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-pro";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct GeminiClient {
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl GeminiClient {
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
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GradingClient for GeminiClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, system, user), fields(backend = %self.name, model = %self.model))]
    async fn chat(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let start = Instant::now();

        let body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: [Part { text: system }],
            },
            contents: [Content {
                role: Some("user"),
                parts: [Part { text: user }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let response = check_status(response, &self.model).await?;
        let api_response: GenerateContentResponse = response.json().await.map_err(parse_error)?;

        // Multi-part candidates are concatenated.
        let content: String = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse.into());
        }

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "gemini content received"
        );
        Ok(content)
    }
}
