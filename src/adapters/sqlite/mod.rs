//! Durable SQLite adapters: the same ports the in-memory adapters implement,
//! backed by a WAL-mode database so state survives a process restart.

pub mod cell_adapter;
pub mod connection;
pub mod message_store;
pub mod migrations;
pub mod policy_store;
pub mod rate_limit_backend;
pub mod reservation_store;

pub use cell_adapter::SqliteCellAdapter;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use message_store::SqliteMessageStore;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use policy_store::SqlitePolicyStore;
pub use rate_limit_backend::SqliteRateLimitBackend;
pub use reservation_store::SqliteReservationStore;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::StorageError;

/// Parses an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StorageError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(e.to_string()))
}

/// Parses an optional RFC3339 datetime string from a SQLite row field.
pub fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StorageError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Deserializes a JSON column, falling back to the type's default when NULL.
pub fn parse_json_or_default<T: serde::de::DeserializeOwned + Default>(s: Option<String>) -> Result<T, StorageError> {
    s.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| StorageError::SerializationError(e.to_string()))
        .map(|opt| opt.unwrap_or_default())
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("query error: {0}")]
    Query(#[from] sqlx::Error),
}

pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(database_url, None).await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}

pub async fn initialize_default_database() -> Result<SqlitePool, DatabaseError> {
    initialize_database("sqlite:.swarm/swarmcore.db").await
}

/// Creates an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator.run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
