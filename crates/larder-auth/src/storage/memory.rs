//! In-memory token ledger.
//!
//! Both tables live behind one async mutex, so every operation (including
//! the multi-row revocation) is atomic with respect to every other. This is
//! the store itself, not a cache in front of another store; it is meant for
//! tests and single-process development setups.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::ledger::TokenLedger;
use crate::types::{
    BlacklistEntry, CleanupReport, LedgerStats, RefreshTokenRecord, RevocationReason, TokenType,
};

#[derive(Debug, Default)]
struct LedgerState {
    blacklist: HashMap<String, BlacklistEntry>,
    tracking: HashMap<String, RefreshTokenRecord>,
}

impl LedgerState {
    fn blacklist_refresh(
        &mut self,
        record: &RefreshTokenRecord,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) {
        self.blacklist.entry(record.jti.clone()).or_insert_with(|| {
            BlacklistEntry::new(
                record.jti.clone(),
                TokenType::Refresh,
                record.user_id.clone(),
                reason,
                now,
                record.expires_at,
            )
        });
    }
}

/// Token ledger backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryTokenLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every blacklist entry (test and diagnostics helper).
    pub async fn blacklist_entries(&self) -> Vec<BlacklistEntry> {
        self.state.lock().await.blacklist.values().cloned().collect()
    }

    /// Returns every tracking record (test and diagnostics helper).
    pub async fn tracking_records(&self) -> Vec<RefreshTokenRecord> {
        self.state.lock().await.tracking.values().cloned().collect()
    }
}

#[async_trait]
impl TokenLedger for InMemoryTokenLedger {
    async fn add_to_blacklist(&self, entry: &BlacklistEntry) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state
            .blacklist
            .entry(entry.jti.clone())
            .or_insert_with(|| entry.clone());
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &str) -> AuthResult<bool> {
        Ok(self.state.lock().await.blacklist.contains_key(jti))
    }

    async fn track_refresh_token(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        match state.tracking.entry(record.jti.clone()) {
            Entry::Occupied(_) => Err(AuthError::conflict(format!(
                "refresh token '{}' is already tracked",
                record.jti
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn find_by_jti(&self, jti: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(self.state.lock().await.tracking.get(jti).cloned())
    }

    async fn mark_used_if_unused(&self, jti: &str, used_at: OffsetDateTime) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        match state.tracking.get_mut(jti) {
            Some(record) if !record.used => {
                record.used = true;
                record.used_at = Some(used_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn consume_and_track(
        &self,
        parent_jti: &str,
        child: &RefreshTokenRecord,
        used_at: OffsetDateTime,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock().await;

        if !state.tracking.get(parent_jti).is_some_and(|r| !r.used) {
            return Ok(false);
        }
        if state.tracking.contains_key(&child.jti) {
            return Err(AuthError::conflict(format!(
                "refresh token '{}' is already tracked",
                child.jti
            )));
        }

        if let Some(parent) = state.tracking.get_mut(parent_jti) {
            parent.used = true;
            parent.used_at = Some(used_at);
        }
        state.tracking.insert(child.jti.clone(), child.clone());
        Ok(true)
    }

    async fn revoke_active_for_user(
        &self,
        user_id: &str,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) -> AuthResult<Vec<String>> {
        let mut state = self.state.lock().await;

        let mut revoked = Vec::new();
        for record in state.tracking.values_mut() {
            if record.user_id == user_id && !record.used {
                record.used = true;
                record.used_at = Some(now);
                revoked.push(record.clone());
            }
        }

        for record in &revoked {
            state.blacklist_refresh(record, reason, now);
        }

        Ok(revoked.into_iter().map(|r| r.jti).collect())
    }

    async fn revoke_refresh_token(
        &self,
        jti: &str,
        reason: RevocationReason,
        now: OffsetDateTime,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock().await;

        let record = match state.tracking.get_mut(jti) {
            Some(record) if !record.used => {
                record.used = true;
                record.used_at = Some(now);
                record.clone()
            }
            _ => return Ok(false),
        };

        state.blacklist_refresh(&record, reason, now);
        Ok(true)
    }

    async fn list_active_for_user(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> AuthResult<Vec<RefreshTokenRecord>> {
        let state = self.state.lock().await;
        let mut active: Vec<RefreshTokenRecord> = state
            .tracking
            .values()
            .filter(|r| r.user_id == user_id && r.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> AuthResult<CleanupReport> {
        let mut state = self.state.lock().await;

        let blacklist_before = state.blacklist.len();
        state.blacklist.retain(|_, e| !e.is_expired_at(now));
        let tracking_before = state.tracking.len();
        state.tracking.retain(|_, r| !r.is_expired_at(now));

        Ok(CleanupReport {
            blacklist_removed: (blacklist_before - state.blacklist.len()) as u64,
            tracking_removed: (tracking_before - state.tracking.len()) as u64,
        })
    }

    async fn stats(&self, now: OffsetDateTime) -> AuthResult<LedgerStats> {
        let state = self.state.lock().await;
        Ok(LedgerStats {
            blacklist_entries: state.blacklist.len() as u64,
            tracked_tokens: state.tracking.len() as u64,
            active_tokens: state
                .tracking
                .values()
                .filter(|r| r.is_active_at(now))
                .count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionContext;
    use time::Duration;

    fn record(user_id: &str, now: OffsetDateTime, lifetime: Duration) -> RefreshTokenRecord {
        RefreshTokenRecord::issue(user_id, None, lifetime, &SessionContext::default(), now)
    }

    #[tokio::test]
    async fn test_track_and_find() {
        let ledger = InMemoryTokenLedger::new();
        let now = OffsetDateTime::now_utc();
        let r = record("user-1", now, Duration::days(1));

        ledger.track_refresh_token(&r).await.unwrap();
        assert_eq!(ledger.find_by_jti(&r.jti).await.unwrap(), Some(r.clone()));
        assert!(ledger.find_by_jti("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_tracking_conflicts() {
        let ledger = InMemoryTokenLedger::new();
        let r = record("user-1", OffsetDateTime::now_utc(), Duration::days(1));

        ledger.track_refresh_token(&r).await.unwrap();
        let err = ledger.track_refresh_token(&r).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_mark_used_only_once() {
        let ledger = InMemoryTokenLedger::new();
        let now = OffsetDateTime::now_utc();
        let r = record("user-1", now, Duration::days(1));
        ledger.track_refresh_token(&r).await.unwrap();

        assert!(ledger.mark_used_if_unused(&r.jti, now).await.unwrap());
        assert!(!ledger.mark_used_if_unused(&r.jti, now).await.unwrap());
        assert!(!ledger.mark_used_if_unused("missing", now).await.unwrap());

        let stored = ledger.find_by_jti(&r.jti).await.unwrap().unwrap();
        assert!(stored.used);
        assert_eq!(stored.used_at, Some(now));
    }

    #[tokio::test]
    async fn test_consume_and_track_is_all_or_nothing() {
        let ledger = InMemoryTokenLedger::new();
        let now = OffsetDateTime::now_utc();
        let parent = record("user-1", now, Duration::days(1));
        ledger.track_refresh_token(&parent).await.unwrap();

        let child = RefreshTokenRecord::issue(
            "user-1",
            Some(parent.jti.clone()),
            Duration::days(1),
            &SessionContext::default(),
            now,
        );
        assert!(ledger.consume_and_track(&parent.jti, &child, now).await.unwrap());
        assert!(ledger.find_by_jti(&parent.jti).await.unwrap().unwrap().used);
        assert!(ledger.find_by_jti(&child.jti).await.unwrap().is_some());

        let late = record("user-1", now, Duration::days(1));
        assert!(!ledger.consume_and_track(&parent.jti, &late, now).await.unwrap());
        assert!(ledger.find_by_jti(&late.jti).await.unwrap().is_none());

        // Colliding child id: parent must stay unconsumed.
        let fresh = record("user-1", now, Duration::days(1));
        ledger.track_refresh_token(&fresh).await.unwrap();
        let err = ledger
            .consume_and_track(&fresh.jti, &child, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict { .. }));
        assert!(!ledger.find_by_jti(&fresh.jti).await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_blacklist_entry_is_never_overwritten() {
        let ledger = InMemoryTokenLedger::new();
        let now = OffsetDateTime::now_utc();
        let first = BlacklistEntry::new(
            "a-1",
            TokenType::Access,
            "user-1",
            RevocationReason::Logout,
            now,
            now + Duration::minutes(10),
        );
        let second = BlacklistEntry::new(
            "a-1",
            TokenType::Access,
            "user-1",
            RevocationReason::Manual,
            now,
            now - Duration::minutes(10),
        );

        ledger.add_to_blacklist(&first).await.unwrap();
        ledger.add_to_blacklist(&second).await.unwrap();

        let entries = ledger.blacklist_entries().await;
        assert_eq!(entries, vec![first]);
    }

    #[tokio::test]
    async fn test_revoke_refresh_token_blacklists_once() {
        let ledger = InMemoryTokenLedger::new();
        let now = OffsetDateTime::now_utc();
        let r = record("user-1", now, Duration::days(1));
        ledger.track_refresh_token(&r).await.unwrap();

        assert!(
            ledger
                .revoke_refresh_token(&r.jti, RevocationReason::Logout, now)
                .await
                .unwrap()
        );
        assert!(
            !ledger
                .revoke_refresh_token(&r.jti, RevocationReason::Logout, now)
                .await
                .unwrap()
        );
        assert!(ledger.is_blacklisted(&r.jti).await.unwrap());
        assert_eq!(ledger.blacklist_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_list_active_newest_first() {
        let ledger = InMemoryTokenLedger::new();
        let now = OffsetDateTime::now_utc();
        let older = record("user-1", now - Duration::hours(2), Duration::days(1));
        let newer = record("user-1", now - Duration::hours(1), Duration::days(1));
        let expired = record("user-1", now - Duration::days(2), Duration::days(1));
        let other_user = record("user-2", now, Duration::days(1));
        for r in [&older, &newer, &expired, &other_user] {
            ledger.track_refresh_token(r).await.unwrap();
        }

        let active = ledger.list_active_for_user("user-1", now).await.unwrap();
        let jtis: Vec<&str> = active.iter().map(|r| r.jti.as_str()).collect();
        assert_eq!(jtis, vec![newer.jti.as_str(), older.jti.as_str()]);
    }

    #[test]
    fn test_stats_counts() {
        tokio_test::block_on(async {
            let ledger = InMemoryTokenLedger::new();
            let now = OffsetDateTime::now_utc();
            let active = record("user-1", now, Duration::days(1));
            let used = record("user-1", now, Duration::days(1));
            ledger.track_refresh_token(&active).await.unwrap();
            ledger.track_refresh_token(&used).await.unwrap();
            ledger
                .revoke_refresh_token(&used.jti, RevocationReason::Manual, now)
                .await
                .unwrap();

            let stats = ledger.stats(now).await.unwrap();
            assert_eq!(
                stats,
                LedgerStats {
                    blacklist_entries: 1,
                    tracked_tokens: 2,
                    active_tokens: 1,
                }
            );
        });
    }
}
