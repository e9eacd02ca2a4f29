//! Exponential backoff around any [`GenerationService`].

use super::{GenerationService, RawReply};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// `min(base * factor^attempt, max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt as i32);
        let millis = self.base_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: GenerationService> RetryingGenerator<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<G: GenerationService> GenerationService for RetryingGenerator<G> {
    async fn generate(&self, instruction: &str, query: &str) -> Result<RawReply> {
        let mut attempt = 0;

        loop {
            match self.inner.generate(instruction, query).await {
                Ok(reply) => return Ok(reply),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts = attempt + 1, error = %e, "Generation failed after retries");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdvisorError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Flaky {
        failures: u32,
        calls: Arc<AtomicU32>,
        error: fn() -> AdvisorError,
    }

    #[async_trait]
    impl GenerationService for Flaky {
        async fn generate(&self, _instruction: &str, _query: &str) -> Result<RawReply> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(RawReply::text("ok"))
            }
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let generator = RetryingGenerator::new(
            Flaky {
                failures: 2,
                calls: calls.clone(),
                error: || AdvisorError::LlmError("503".into()),
            },
            fast_policy(3),
        );

        let reply = generator.generate("i", "q").await.unwrap();
        assert_eq!(reply.response.as_deref(), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let generator = RetryingGenerator::new(
            Flaky {
                failures: 10,
                calls: calls.clone(),
                error: || AdvisorError::Timeout("slow".into()),
            },
            fast_policy(2),
        );

        assert!(generator.generate("i", "q").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let generator = RetryingGenerator::new(
            Flaky {
                failures: 10,
                calls: calls.clone(),
                error: || AdvisorError::InvalidInput("bad".into()),
            },
            fast_policy(3),
        );

        assert!(matches!(
            generator.generate("i", "q").await,
            Err(AdvisorError::InvalidInput(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let generator = RetryingGenerator::new(
            Flaky {
                failures: 10,
                calls: calls.clone(),
                error: || AdvisorError::LlmRejected("401 API key not valid".into()),
            },
            fast_policy(3),
        );

        assert!(matches!(
            generator.generate("i", "q").await,
            Err(AdvisorError::LlmRejected(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
