//! Arc-owning [`TokenLedger`] implementation.
//!
//! Single-statement operations delegate to the borrowed table storages.
//! Rotation and multi-row revocations each run in one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use larder_auth::storage::TokenLedger;
use larder_auth::types::{
    BlacklistEntry, CleanupReport, LedgerStats, RefreshTokenRecord, RevocationReason, TokenType,
};
use larder_auth::{AuthError, AuthResult};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgConnection;
use time::OffsetDateTime;

use crate::blacklist::BlacklistStorage;
use crate::tracking::{TrackingStorage, insert_record};
use crate::{PgPool, StorageError, StorageResult};

/// PostgreSQL token ledger.
///
/// Owns an `Arc<PgPool>` so it can be shared as `Arc<dyn TokenLedger>`.
#[derive(Debug, Clone)]
pub struct PostgresTokenLedger {
    pool: Arc<PgPool>,
}

impl PostgresTokenLedger {
    /// Create a ledger over an existing pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn revoke_active_tx(
        &self,
        user_id: &str,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) -> StorageResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<(String, OffsetDateTime)> = query_as(
            r#"
            UPDATE refresh_token_tracking
            SET used = true,
                used_at = $2
            WHERE user_id = $1
              AND used = false
            RETURNING jti, expires_at
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let mut revoked = Vec::with_capacity(rows.len());
        for (jti, expires_at) in rows {
            let entry =
                BlacklistEntry::new(jti, TokenType::Refresh, user_id, reason, now, expires_at);
            insert_entry(&mut *tx, &entry).await?;
            revoked.push(entry.jti);
        }

        tx.commit().await?;
        Ok(revoked)
    }

    async fn revoke_one_tx(
        &self,
        jti: &str,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, OffsetDateTime)> = query_as(
            r#"
            UPDATE refresh_token_tracking
            SET used = true,
                used_at = $2
            WHERE jti = $1
              AND used = false
            RETURNING user_id, expires_at
            "#,
        )
        .bind(jti)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id, expires_at)) = row else {
            tx.rollback().await?;
            return Ok(false);
        };

        let entry = BlacklistEntry::new(jti, TokenType::Refresh, user_id, reason, now, expires_at);
        insert_entry(&mut *tx, &entry).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn consume_and_track_tx(
        &self,
        parent_jti: &str,
        child: &RefreshTokenRecord,
        used_at: OffsetDateTime,
    ) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken here is held until commit, so a concurrent
        // consumer of the same parent blocks until the child is visible.
        let consumed = query(
            r#"
            UPDATE refresh_token_tracking
            SET used = true,
                used_at = $2
            WHERE jti = $1
              AND used = false
            "#,
        )
        .bind(parent_jti)
        .bind(used_at)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_record(&mut *tx, child).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn stats_at(&self, now: OffsetDateTime) -> StorageResult<LedgerStats> {
        let blacklist_entries = BlacklistStorage::new(&self.pool).count().await?;
        let (tracked_tokens, active_tokens) = TrackingStorage::new(&self.pool).counts(now).await?;

        Ok(LedgerStats {
            blacklist_entries: blacklist_entries.max(0) as u64,
            tracked_tokens: tracked_tokens.max(0) as u64,
            active_tokens: active_tokens.max(0) as u64,
        })
    }
}

async fn insert_entry(conn: &mut PgConnection, entry: &BlacklistEntry) -> StorageResult<()> {
    query(
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
    .execute(conn)
    .await?;

    Ok(())
}

/// Maps storage failures onto the ledger error contract.
fn to_auth_error(err: StorageError) -> AuthError {
    match err {
        StorageError::Conflict(message) => AuthError::conflict(message),
        other => AuthError::storage_unavailable(other.to_string()),
    }
}

#[async_trait]
impl TokenLedger for PostgresTokenLedger {
    async fn add_to_blacklist(&self, entry: &BlacklistEntry) -> AuthResult<()> {
        BlacklistStorage::new(&self.pool)
            .insert(entry)
            .await
            .map(|_| ())
            .map_err(to_auth_error)
    }

    async fn is_blacklisted(&self, jti: &str) -> AuthResult<bool> {
        BlacklistStorage::new(&self.pool)
            .exists(jti)
            .await
            .map_err(to_auth_error)
    }

    async fn track_refresh_token(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        TrackingStorage::new(&self.pool)
            .create(record)
            .await
            .map_err(to_auth_error)
    }

    async fn find_by_jti(&self, jti: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        TrackingStorage::new(&self.pool)
            .find_by_jti(jti)
            .await
            .map_err(to_auth_error)
    }

    async fn mark_used_if_unused(&self, jti: &str, used_at: OffsetDateTime) -> AuthResult<bool> {
        TrackingStorage::new(&self.pool)
            .mark_used_if_unused(jti, used_at)
            .await
            .map_err(to_auth_error)
    }

    async fn consume_and_track(
        &self,
        parent_jti: &str,
        child: &RefreshTokenRecord,
        used_at: OffsetDateTime,
    ) -> AuthResult<bool> {
        self.consume_and_track_tx(parent_jti, child, used_at)
            .await
            .map_err(to_auth_error)
    }

    async fn revoke_active_for_user(
        &self,
        user_id: &str,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) -> AuthResult<Vec<String>> {
        self.revoke_active_tx(user_id, reason, now)
            .await
            .map_err(to_auth_error)
    }

    async fn revoke_refresh_token(
        &self,
        jti: &str,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) -> AuthResult<bool> {
        self.revoke_one_tx(jti, reason, now)
            .await
            .map_err(to_auth_error)
    }

    async fn list_active_for_user(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> AuthResult<Vec<RefreshTokenRecord>> {
        TrackingStorage::new(&self.pool)
            .list_active_for_user(user_id, now)
            .await
            .map_err(to_auth_error)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<CleanupReport> {
        let blacklist_removed = BlacklistStorage::new(&self.pool)
            .delete_expired(now)
            .await
            .map_err(to_auth_error)?;
        let tracking_removed = TrackingStorage::new(&self.pool)
            .delete_expired(now)
            .await
            .map_err(to_auth_error)?;

        Ok(CleanupReport {
            blacklist_removed,
            tracking_removed,
        })
    }

    async fn stats(&self, now: OffsetDateTime) -> AuthResult<LedgerStats> {
        self.stats_at(now).await.map_err(to_auth_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_conflict() {
        let err = to_auth_error(StorageError::conflict("dup"));
        assert_eq!(err, AuthError::conflict("dup"));
    }

    #[test]
    fn test_database_error_maps_to_unavailable() {
        let err = to_auth_error(StorageError::Database(sqlx_core::Error::PoolTimedOut));
        assert!(matches!(err, AuthError::StorageUnavailable { .. }));
        assert!(err.requires_reauthentication());
    }
}
