//! Error types for the financial advice router

use thiserror::Error;

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Caller Errors
    // =============================

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =============================
    // Generation Collaborator Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    /// The service refused the request itself (bad key, malformed body).
    #[error("LLM request rejected: {0}")]
    LlmRejected(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Generation timed out: {0}")]
    Timeout(String),

    // =============================
    // Storage Errors
    // =============================

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("State persistence error: {0}")]
    StateError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AdvisorError {
    /// Errors that cross the router boundary as failures. Everything else
    /// is absorbed into a degraded response.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AdvisorError::InvalidInput(_))
    }

    /// Whether another attempt against the generation service could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AdvisorError::InvalidInput(_)
                | AdvisorError::LlmRejected(_)
                | AdvisorError::SerializationError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(AdvisorError::InvalidInput("empty query".into()).is_client_error());
        assert!(!AdvisorError::LlmError("boom".into()).is_client_error());
        assert!(!AdvisorError::RateLimited("60/min".into()).is_client_error());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AdvisorError::LlmError("upstream 503".into()).is_retryable());
        assert!(AdvisorError::RateLimited("60/min".into()).is_retryable());
        assert!(AdvisorError::Timeout("30s".into()).is_retryable());
        assert!(!AdvisorError::InvalidInput("bad".into()).is_retryable());
        assert!(!AdvisorError::LlmRejected("403 forbidden".into()).is_retryable());
        assert!(!AdvisorError::LlmRejected("403 forbidden".into()).is_client_error());

        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!AdvisorError::from(parse_err).is_retryable());
    }
}
