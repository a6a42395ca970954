//! Blacklist storage for PostgreSQL.
//!
//! Rows are terminal: they are inserted once, never updated, and deleted
//! only after `expires_at` has passed.

use larder_auth::types::{BlacklistEntry, RevocationReason, TokenType};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;

use crate::{PgPool, StorageError, StorageResult};

/// Raw blacklist row: (jti, token_type, user_id, revoked_at, expires_at, reason).
pub(crate) type BlacklistRow = (
    String,
    String,
    String,
    OffsetDateTime,
    OffsetDateTime,
    String,
);

pub(crate) fn entry_from_row(row: BlacklistRow) -> StorageResult<BlacklistEntry> {
    let (jti, token_type, user_id, revoked_at, expires_at, reason) = row;
    let token_type: TokenType = token_type
        .parse()
        .map_err(|e: larder_auth::AuthError| StorageError::decode(e.to_string()))?;
    let reason: RevocationReason = reason
        .parse()
        .map_err(|e: larder_auth::AuthError| StorageError::decode(e.to_string()))?;

    Ok(BlacklistEntry {
        jti,
        token_type,
        user_id,
        revoked_at,
        expires_at,
        reason,
    })
}

// =============================================================================
// Blacklist Storage
// =============================================================================

/// Blacklist operations on a borrowed pool.
pub struct BlacklistStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> BlacklistStorage<'a> {
    /// Create a new blacklist storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an entry. An existing row for the same `jti` is left as is.
    ///
    /// Returns `true` if a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn insert(&self, entry: &BlacklistEntry) -> StorageResult<bool> {
        let result = query(
            r#"
            INSERT INTO blacklist (jti, token_type, user_id, revoked_at, expires_at, reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(&entry.jti)
        .bind(entry.token_type.as_str())
        .bind(&entry.user_id)
        .bind(entry.revoked_at)
        .bind(entry.expires_at)
        .bind(entry.reason.as_str())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Check whether a `jti` is blacklisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists(&self, jti: &str) -> StorageResult<bool> {
        let exists: bool = query_scalar("SELECT EXISTS(SELECT 1 FROM blacklist WHERE jti = $1)")
            .bind(jti)
            .fetch_one(self.pool)
            .await?;

        Ok(exists)
    }

    /// Fetch the entry for a `jti`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn find(&self, jti: &str) -> StorageResult<Option<BlacklistEntry>> {
        let row: Option<BlacklistRow> = query_as(
            r#"
            SELECT jti, token_type, user_id, revoked_at, expires_at, reason
            FROM blacklist
            WHERE jti = $1
            "#,
        )
        .bind(jti)
        .fetch_optional(self.pool)
        .await?;

        row.map(entry_from_row).transpose()
    }

    /// Delete entries with `expires_at < now`.
    ///
    /// # Returns
    ///
    /// Returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query("DELETE FROM blacklist WHERE expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Get the number of blacklist rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> StorageResult<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM blacklist")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
