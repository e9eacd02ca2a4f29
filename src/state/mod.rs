//! Durable per-user memory
//!
//! Holds what must survive between requests for a user: the remembered tone
//! preference and the payday effect record. Backends only offer
//! `load`/`save`; in-memory for development, Postgres when configured.

use crate::payday::PaydayEffectRecord;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};

pub mod postgres;
pub use postgres::PostgresUserStore;

/// Everything remembered about a user between requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserMemory {
    #[serde(default)]
    pub preferred_tone: Option<String>,
    #[serde(default)]
    pub payday: Option<PaydayEffectRecord>,
}

/// Trait for user memory persistence
#[async_trait::async_trait]
pub trait UserStateStore: Send + Sync {
    /// Missing users load as empty memory.
    async fn load(&self, user_id: &str) -> Result<UserMemory>;
    async fn save(&self, user_id: &str, memory: &UserMemory) -> Result<()>;
}

/// In-memory user store for development
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, UserMemory>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserStateStore for InMemoryUserStore {
    async fn load(&self, user_id: &str) -> Result<UserMemory> {
        let users = self.users.read().await;
        Ok(users.get(user_id).cloned().unwrap_or_default())
    }

    async fn save(&self, user_id: &str, memory: &UserMemory) -> Result<()> {
        let mut users = self.users.write().await;
        users.insert(user_id.to_string(), memory.clone());
        Ok(())
    }
}

/// Per-user exclusion for read-modify-write cycles on [`UserMemory`].
///
/// Stores only offer whole-value `load`/`save`, so every writer must hold
/// the user's lock from its load until its save.
#[derive(Default)]
pub struct UserLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let existing = {
            let locks = self.locks.read().await;
            locks.get(user_id).cloned()
        };

        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut locks = self.locks.write().await;
                locks
                    .entry(user_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            }
        };

        slot.lock_owned().await
    }
}

/// Postgres when a database URL is given and usable, in-memory otherwise.
pub fn build_user_store(database_url: Option<&str>) -> Arc<dyn UserStateStore> {
    if let Some(url) = database_url {
        match PostgresUserStore::connect_lazy(url) {
            Ok(store) => {
                info!("User memory backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres user store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("User memory backend: in-memory");
    Arc::new(InMemoryUserStore::new())
}
