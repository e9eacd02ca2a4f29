//! Environment-driven configuration
//!
//! Binaries call `dotenv::dotenv()` first, then [`AdvisorConfig::from_env`].
//! Unparseable values fall back to their defaults with a warning.

use crate::agent::RoutingOrchestrator;
use crate::gemini::{GeminiClient, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_RATE_LIMIT};
use crate::generation::cache::DEFAULT_CACHE_TTL;
use crate::generation::{GenerationService, OfflineGenerator, RetryPolicy, RetryingGenerator};
use crate::payday::{
    PaydayPatternDetector, DEFAULT_HISTORY_RETENTION, DEFAULT_OVERSPEND_BASELINE,
    DEFAULT_PAYDAY_WINDOW_DAYS,
};
use crate::state::build_user_store;
use crate::Result;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub rate_limit_per_minute: usize,
    pub cache_ttl: Duration,
    pub retry: RetryPolicy,
    pub payday_window_days: i64,
    pub overspend_baseline: f64,
    pub history_retention: usize,
    pub database_url: Option<String>,
    pub port: u16,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT,
            cache_ttl: DEFAULT_CACHE_TTL,
            retry: RetryPolicy::default(),
            payday_window_days: DEFAULT_PAYDAY_WINDOW_DAYS,
            overspend_baseline: DEFAULT_OVERSPEND_BASELINE,
            history_retention: DEFAULT_HISTORY_RETENTION,
            database_url: None,
            port: DEFAULT_PORT,
        }
    }
}

impl AdvisorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let retry = RetryPolicy {
            max_retries: parse_or(&lookup, "GEMINI_MAX_RETRIES", defaults.retry.max_retries),
            base_delay: Duration::from_millis(parse_or(
                &lookup,
                "GEMINI_RETRY_BASE_MS",
                defaults.retry.base_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_millis(parse_or(
                &lookup,
                "GEMINI_RETRY_MAX_MS",
                defaults.retry.max_delay.as_millis() as u64,
            )),
            ..defaults.retry.clone()
        };

        Self {
            gemini_api_key: text("GEMINI_API_KEY"),
            gemini_model: text("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: text("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            rate_limit_per_minute: parse_or(
                &lookup,
                "GEMINI_RATE_LIMIT",
                defaults.rate_limit_per_minute,
            ),
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "GEMINI_CACHE_TTL",
                defaults.cache_ttl.as_secs(),
            )),
            retry,
            payday_window_days: parse_or(&lookup, "PAYDAY_WINDOW_DAYS", defaults.payday_window_days),
            overspend_baseline: parse_or(
                &lookup,
                "PAYDAY_OVERSPEND_BASELINE",
                defaults.overspend_baseline,
            ),
            history_retention: parse_or(
                &lookup,
                "SPENDING_HISTORY_RETENTION",
                defaults.history_retention,
            ),
            database_url: text("DATABASE_URL").or_else(|| text("POSTGRES_URL")),
            port: text("PORT")
                .map(|_| parse_or(&lookup, "PORT", defaults.port))
                .unwrap_or_else(|| parse_or(&lookup, "API_PORT", defaults.port)),
        }
    }

    pub fn payday_detector(&self) -> PaydayPatternDetector {
        PaydayPatternDetector::new()
            .with_window_days(self.payday_window_days)
            .with_baseline(self.overspend_baseline)
            .with_retention(self.history_retention)
    }

    /// Gemini with retries when a key is configured, the offline generator otherwise.
    pub fn build_generator(&self) -> Result<Arc<dyn GenerationService>> {
        match &self.gemini_api_key {
            Some(key) => {
                let client = GeminiClient::new(key.clone())?
                    .with_model(self.gemini_model.clone())
                    .with_base_url(self.gemini_base_url.clone())
                    .with_cache_ttl(self.cache_ttl)
                    .with_rate_limit(self.rate_limit_per_minute);

                info!(model = %self.gemini_model, "Generation backend: gemini");
                Ok(Arc::new(RetryingGenerator::new(client, self.retry.clone())))
            }
            None => {
                warn!("GEMINI_API_KEY not set, using offline generator");
                Ok(Arc::new(OfflineGenerator))
            }
        }
    }

    pub fn build_orchestrator(&self) -> Result<RoutingOrchestrator> {
        let generator = self.build_generator()?;
        let users = build_user_store(self.database_url.as_deref());

        Ok(RoutingOrchestrator::new(generator, users).with_payday_detector(self.payday_detector()))
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = %key, value = %raw, default = %default, "Invalid config value, using default");
                default
            }
        },
    }
}
