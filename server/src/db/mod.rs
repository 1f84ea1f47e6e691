//! Database Layer
//!
//! The `UserStore` seam plus its `PostgreSQL` and in-process implementations.

mod memory;
mod models;
mod queries;


use anyhow::Result;
use async_trait::async_trait;
pub use memory::MemoryUserStore;
pub use models::*;
pub use queries::*;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;

/// Store-level failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence for user accounts.
///
/// Email uniqueness is enforced by the store itself: `create` must fail with
/// `StoreError::DuplicateEmail` for an email that is already taken, even when
/// two inserts race.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Exact, case-sensitive lookup.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn email_exists(&self, email: &str) -> StoreResult<bool>;

    async fn create(&self, new_user: NewUser) -> StoreResult<User>;

    /// Apply a partial update. `Ok(None)` if no such user.
    async fn update(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>>;

    /// Cheap connectivity check for `/health`.
    async fn ping(&self) -> StoreResult<()>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Create `PostgreSQL` connection pool with health configuration.
pub async fn create_pool(database_url: &str, config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(config.db_min_connections)
        .max_connections(config.db_max_connections)
        // Fail fast on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(config.db_idle_timeout)
        .max_lifetime(config.db_max_lifetime)
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    info!(
        max_connections = config.db_max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
