//! Postgres-backed user memory
//!
//! One row per user holding the JSON-serialised [`UserMemory`]. The table is
//! created lazily on first use.

use super::{UserMemory, UserStateStore};
use crate::error::AdvisorError;
use crate::Result;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct PostgresUserStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresUserStore {
    /// Builds the pool without connecting; the first query connects.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| {
                AdvisorError::DatabaseError(format!("Invalid database configuration: {}", e))
            })?;

        Ok(Self::with_pool(pool))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS user_memory (
                      user_id TEXT PRIMARY KEY,
                      payload TEXT NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AdvisorError::DatabaseError(format!(
                    "Failed to initialize user memory schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStateStore for PostgresUserStore {
    async fn load(&self, user_id: &str) -> Result<UserMemory> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT payload FROM user_memory WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AdvisorError::DatabaseError(format!("Failed to load user memory: {}", e))
            })?;

        let Some(row) = row else {
            return Ok(UserMemory::default());
        };

        let payload: String = row.try_get("payload").map_err(|e| {
            AdvisorError::DatabaseError(format!("Malformed user memory row: {}", e))
        })?;

        Ok(serde_json::from_str(&payload)?)
    }

    async fn save(&self, user_id: &str, memory: &UserMemory) -> Result<()> {
        self.ensure_schema().await?;

        let payload = serde_json::to_string(memory)?;

        sqlx::query(
            r#"
            INSERT INTO user_memory (user_id, payload, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| AdvisorError::DatabaseError(format!("Failed to save user memory: {}", e)))?;

        Ok(())
    }
}
