//! PostgreSQL storage backend for larder-auth
//!
//! Provides persistent storage for:
//!
//! - The token blacklist (revoked access and refresh tokens)
//! - Refresh token tracking records (rotation chains)
//!
//! Both tables are created by the embedded [`migrations`].
//!
//! # Example
//!
//! ```ignore
//! use larder_auth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/larder").await?;
//! storage.migrate().await?;
//!
//! let ledger = Arc::new(storage.ledger());
//! let service = TokenLifecycleService::new(ledger, config, audit)?;
//! ```

pub mod blacklist;
pub mod ledger;
pub mod migrations;
pub mod tracking;

use std::sync::Arc;
use std::time::Duration;

use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use blacklist::BlacklistStorage;
pub use ledger::PostgresTokenLedger;
pub use tracking::TrackingStorage;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during ledger storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Row already exists (conflict).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be mapped back to a domain type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Applying migrations failed.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a `Decode` error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Pool settings used by [`PostgresAuthStorage::connect_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// How long to wait for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// PostgreSQL storage backend for the token ledger.
///
/// Holds a connection pool and hands out table-level storage views and the
/// [`PostgresTokenLedger`].
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with(database_url, PoolSettings::default()).await
    }

    /// Create new storage by connecting with explicit pool settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect_with(database_url: &str, settings: PoolSettings) -> StorageResult<Self> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Migration` if a migration fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        migrations::run(&self.pool).await
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    /// Get blacklist storage operations.
    #[must_use]
    pub fn blacklist(&self) -> BlacklistStorage<'_> {
        BlacklistStorage::new(&self.pool)
    }

    /// Get refresh token tracking storage operations.
    #[must_use]
    pub fn tracking(&self) -> TrackingStorage<'_> {
        TrackingStorage::new(&self.pool)
    }

    /// Get a [`TokenLedger`](larder_auth::TokenLedger) sharing this pool.
    #[must_use]
    pub fn ledger(&self) -> PostgresTokenLedger {
        PostgresTokenLedger::new(Arc::clone(&self.pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_predicates() {
        let err = StorageError::conflict("duplicate jti");
        assert!(err.is_conflict());
        assert!(!err.is_database_error());
        assert_eq!(err.to_string(), "Conflict: duplicate jti");

        let err = StorageError::Database(sqlx_core::Error::PoolTimedOut);
        assert!(err.is_database_error());
    }

    #[test]
    fn test_default_pool_settings() {
        let settings = PoolSettings::default();
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(5));
    }
}
