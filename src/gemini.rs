//! Gemini API client
//!
//! Backs [`GenerationService`] with the Gemini `generateContent` endpoint.
//! Uses a long-lived reqwest::Client for connection pooling, a TTL cache of
//! recent replies and a per-minute rate limit on outgoing calls.

use crate::error::AdvisorError;
use crate::generation::{cache_key, GenerationService, RateLimiter, RawReply, ResponseCache};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_RATE_LIMIT: usize = 60;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    cache: ResponseCache,
    limiter: RateLimiter,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            cache: ResponseCache::default(),
            limiter: RateLimiter::new(DEFAULT_RATE_LIMIT),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = ResponseCache::new(ttl);
        self
    }

    pub fn with_rate_limit(mut self, max_per_minute: usize) -> Self {
        self.limiter = RateLimiter::new(max_per_minute);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// One raw call; returns the first candidate's text.
    async fn call(&self, instruction: &str, query: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AdvisorError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let request = build_request(instruction, query);

        info!(model = %self.model, "Calling Gemini API");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                if e.is_timeout() {
                    AdvisorError::Timeout(format!("Gemini API timed out: {}", e))
                } else {
                    AdvisorError::LlmError(format!("Gemini API error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, "Gemini API error response: {}", error_text);
            return Err(status_error(status, &error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AdvisorError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        if let Some(usage) = &gemini_response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "Gemini token usage"
            );
        }

        first_candidate_text(gemini_response)
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, instruction: &str, query: &str) -> Result<RawReply> {
        let key = cache_key(instruction, query);
        if let Some(reply) = self.cache.get(&key) {
            return Ok(reply);
        }

        self.limiter.acquire()?;

        let text = self.call(instruction, query).await?;
        let reply = RawReply::from_model_text(&text);

        info!(
            structured = reply.metadata.is_some(),
            "Gemini response received"
        );

        self.cache.insert(key, reply.clone());
        Ok(reply)
    }
}

fn build_request(instruction: &str, query: &str) -> GeminiRequest {
    GeminiRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: query.to_string(),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 1024,
        },
        system_instruction: SystemInstruction {
            parts: vec![Part {
                text: instruction.to_string(),
            }],
        },
    }
}

fn first_candidate_text(response: GeminiResponse) -> Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AdvisorError::LlmError("No response from Gemini API".to_string()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        debug!(finish_reason = %reason, "Gemini candidate finished");
    }

    candidate
        .content
        .parts
        .into_iter()
        .next()
        .map(|part| part.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AdvisorError::LlmError("Empty response from Gemini".to_string()))
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i32,
    #[serde(default)]
    candidates_token_count: i32,
}

/// Map a non-success status. 4xx other than 408 and 429 will not change on retry.
fn status_error(status: StatusCode, body: &str) -> AdvisorError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AdvisorError::RateLimited(format!("Gemini API: {}", body)),
        StatusCode::REQUEST_TIMEOUT => {
            AdvisorError::Timeout(format!("Gemini API error {}: {}", status, body))
        }
        s if s.is_client_error() => {
            AdvisorError::LlmRejected(format!("Gemini API error {}: {}", status, body))
        }
        _ => AdvisorError::LlmError(format!("Gemini API error {}: {}", status, body)),
    }
}
