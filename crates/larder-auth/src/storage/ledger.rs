//! Token ledger storage trait.
//!
//! # Concurrency
//!
//! Implementations are shared by every request-handling worker and must be
//! safe under concurrent invocation. Two operations carry stronger
//! guarantees than plain row CRUD:
//!
//! - [`TokenLedger::mark_used_if_unused`] is a single compare-and-swap
//!   write. It must never be implemented as a read followed by a write.
//! - [`TokenLedger::revoke_active_for_user`] runs in one transaction.
//!   Partial revocation is a security failure.
//!
//! Implementations must not cache token state in process: every call reads
//! the source of truth so a revocation is visible on the very next request.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::{
    BlacklistEntry, CleanupReport, LedgerStats, RefreshTokenRecord, RevocationReason,
};

/// Persistent store of blacklist entries and refresh token tracking records.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Adds an entry to the blacklist.
    ///
    /// Blacklisting a `jti` that is already present succeeds and leaves the
    /// existing entry untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be reached.
    async fn add_to_blacklist(&self, entry: &BlacklistEntry) -> AuthResult<()>;

    /// Checks whether a `jti` is on the blacklist.
    ///
    /// Called on every authenticated request; must be an indexed lookup.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be reached.
    async fn is_blacklisted(&self, jti: &str) -> AuthResult<bool>;

    /// Stores a new refresh token tracking record.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if a record with the same `jti` exists, or
    /// `StorageUnavailable` if the store cannot be reached.
    async fn track_refresh_token(&self, record: &RefreshTokenRecord) -> AuthResult<()>;

    /// Finds a tracking record by `jti`, regardless of its state.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be reached.
    async fn find_by_jti(&self, jti: &str) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Atomically consumes a refresh token.
    ///
    /// Sets `used = true, used_at = used_at` only where `used = false`.
    /// Returns `true` if exactly one record changed; `false` if the record is
    /// missing or was already consumed (possibly by a concurrent caller).
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be reached.
    async fn mark_used_if_unused(&self, jti: &str, used_at: OffsetDateTime) -> AuthResult<bool>;

    /// Consumes `parent_jti` and stores its successor in one transaction.
    ///
    /// Same condition as [`TokenLedger::mark_used_if_unused`]; the child is
    /// stored only if the parent changed. A caller that loses the race must
    /// not observe the parent as consumed before the child is visible, so a
    /// revocation issued after losing always covers the child.
    ///
    /// Returns `false`, storing nothing, if the parent is missing or
    /// already consumed.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the child `jti` is already tracked, or
    /// `StorageUnavailable` if the store cannot be reached. In both cases the
    /// parent is left unconsumed.
    async fn consume_and_track(
        &self,
        parent_jti: &str,
        child: &RefreshTokenRecord,
        used_at: OffsetDateTime,
    ) -> AuthResult<bool>;

    /// Revokes every unused refresh token of a user in one transaction.
    ///
    /// Each affected record is marked consumed at `now` and gets one
    /// refresh-type blacklist entry with the record's own expiry. Records
    /// that were already consumed are left untouched.
    ///
    /// Returns the `jti`s that were revoked.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be reached or the
    /// transaction fails; in that case nothing was revoked.
    async fn revoke_active_for_user(
        &self,
        user_id: &str,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) -> AuthResult<Vec<String>>;

    /// Revokes a single refresh token in one transaction.
    ///
    /// Conditionally consumes the record and, if that succeeded, blacklists
    /// it. Returns `false` if the record is missing or already consumed.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be reached.
    async fn revoke_refresh_token(
        &self,
        jti: &str,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) -> AuthResult<bool>;

    /// Lists the user's unused, unexpired refresh tokens, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be reached.
    async fn list_active_for_user(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> AuthResult<Vec<RefreshTokenRecord>>;

    /// Deletes every blacklist and tracking row with `expires_at < now`.
    ///
    /// Rows still inside their validity window are never touched or locked.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be reached.
    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<CleanupReport>;

    /// Returns row counts for monitoring.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be reached.
    async fn stats(&self, now: OffsetDateTime) -> AuthResult<LedgerStats>;
}
