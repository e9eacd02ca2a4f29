//! Response cache and request rate limiter for the generation backend.

use super::RawReply;
use crate::error::AdvisorError;
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CACHE_CAPACITY: usize = 100;
/// Entries dropped at once when the cache is full.
const EVICTION_BATCH: usize = 10;
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Stable key over the full instruction and query.
pub fn cache_key(instruction: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(instruction.as_bytes());
    hasher.update([0u8]);
    hasher.update(query.as_bytes());
    hex::encode(hasher.finalize())
}

/// TTL cache of successful replies.
pub struct ResponseCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, (Instant, RawReply)>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<RawReply> {
        let mut entries = self.entries.lock().ok()?;

        match entries.get(key) {
            Some((stored_at, reply)) if stored_at.elapsed() < self.ttl => {
                debug!(key = %key, "Cache hit");
                Some(reply.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, reply: RawReply) {
        let Ok(mut entries) = self.entries.lock() else {
            warn!("Response cache lock poisoned, skipping insert");
            return;
        };

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let mut by_age: Vec<(String, Instant)> = entries
                .iter()
                .map(|(k, (stored_at, _))| (k.clone(), *stored_at))
                .collect();
            by_age.sort_by_key(|(_, stored_at)| *stored_at);

            for (old_key, _) in by_age.into_iter().take(EVICTION_BATCH) {
                entries.remove(&old_key);
            }
        }

        entries.insert(key, (Instant::now(), reply));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

/// Sliding one-minute window over outgoing requests.
pub struct RateLimiter {
    max_per_minute: usize,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: usize) -> Self {
        Self {
            max_per_minute,
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Claim a slot, or fail with `RateLimited` when the window is full.
    pub fn acquire(&self) -> Result<()> {
        let mut window = self
            .window
            .lock()
            .map_err(|_| AdvisorError::StateError("Rate limiter lock poisoned".to_string()))?;

        let now = Instant::now();
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= RATE_WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.max_per_minute {
            warn!(limit = self.max_per_minute, "Generation rate limit reached");
            return Err(AdvisorError::RateLimited(format!(
                "more than {} requests in the last minute",
                self.max_per_minute
            )));
        }

        window.push_back(now);
        Ok(())
    }
}
