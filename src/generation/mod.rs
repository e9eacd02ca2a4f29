//! Generation collaborator
//!
//! The router never produces advice text itself. It hands a finished
//! instruction plus the enriched query to a [`GenerationService`] and
//! normalises whatever comes back.

use crate::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

pub mod cache;
pub mod retry;

pub use cache::{cache_key, RateLimiter, ResponseCache};
pub use retry::{RetryPolicy, RetryingGenerator};

/// Unvalidated reply from the generation service.
///
/// `metadata` is whatever object the model produced, possibly partial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReply {
    pub response: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl RawReply {
    /// Plain text with no structured metadata.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
            metadata: None,
        }
    }

    /// Interpret raw model output: a JSON object with `response` and/or
    /// `metadata` when one can be found, the whole text otherwise.
    pub fn from_model_text(text: &str) -> Self {
        match extract_json(text) {
            Some(object) => {
                let response = object
                    .get("response")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let metadata = object.get("metadata").and_then(Value::as_object).cloned();
                Self { response, metadata }
            }
            None => {
                debug!("Model reply is not structured JSON, using raw text");
                Self::text(text.trim())
            }
        }
    }
}

/// Trait for the external text generation backend
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, instruction: &str, query: &str) -> Result<RawReply>;
}

/// Try to extract the reply object from model output.
///
/// Accepts bare JSON, a ```json fenced block, or the outermost `{ ... }`
/// span, with trailing commas tolerated.
pub fn extract_json(text: &str) -> Option<Map<String, Value>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut candidates: Vec<&str> = vec![text];

    if let Some(start) = text.find("```json") {
        let after = &text[start + 7..];
        if let Some(end) = after.find("```") {
            candidates.push(after[..end].trim());
        }
    }

    if let (Some(open), Some(close)) = (text.find('{'), text.rfind('}')) {
        if open < close {
            candidates.push(&text[open..=close]);
        }
    }

    for candidate in candidates {
        let parsed = serde_json::from_str::<Value>(candidate)
            .or_else(|_| serde_json::from_str::<Value>(&strip_trailing_commas(candidate)));

        if let Ok(Value::Object(object)) = parsed {
            if object.contains_key("response") || object.contains_key("metadata") {
                return Some(object);
            }
        }
    }

    None
}

/// Drop commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());

    for (i, c) in chars.iter().enumerate() {
        if *c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(*c);
    }

    out
}

/// Deterministic generator used when no model is configured.
/// Keeps the pipeline functional without an API key.
pub struct OfflineGenerator;

#[async_trait]
impl GenerationService for OfflineGenerator {
    async fn generate(&self, _instruction: &str, query: &str) -> Result<RawReply> {
        let question = query.lines().next().unwrap_or(query).trim();
        Ok(RawReply::text(format!(
            "The advice model is not configured, so I can't give a personalised answer to \
             \"{}\" yet. Set GEMINI_API_KEY to enable full responses.",
            question
        )))
    }
}
