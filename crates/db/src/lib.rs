//! Storage layer for the zrep reputation aggregator.
//!
//! Exposes the [`Storage`] contract with two interchangeable backends:
//! [`MemoryStorage`] for development/tests and [`PostgresStorage`] for
//! production, plus the pool/health/migration helpers the API binary
//! uses at startup.

use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod models;
pub mod postgres;
pub mod storage;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use storage::{Storage, StorageError, StorageStats, TIER_HISTORY_CAP};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from the bundled `migrations/` directory.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
