//! Backing stores for grouped log records.
//!
//! - [`GroupStore`]: the store boundary used by the merger.
//! - [`MemoryGroupStore`]: in-process store with trigram fuzzy search.
//! - [`PgGroupStore`]: PostgreSQL store backed by the `log_groups` table.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod similarity;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryGroupStore;
pub use postgres::PgGroupStore;
pub use store::{GroupStore, GroupWrite};

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Verify the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// Apply the embedded migrations under `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
