//! Refresh token rotation with reuse detection.
//!
//! Every refresh token can be exchanged exactly once. Consumption and the
//! insert of the successor are one conditional ledger transaction, so when
//! several requests present the same token concurrently exactly one of them
//! wins, and the losers only see it consumed once the successor exists. Every other presentation
//! of a consumed token, concurrent or later, is treated as theft: the user's
//! active sessions are revoked and the request fails with
//! [`AuthError::ReplayDetected`].

use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::AuthResult;
use crate::audit::{AuditSink, SecurityEvent};
use crate::error::AuthError;
use crate::storage::TokenLedger;
use crate::token::revoker::CascadingRevoker;
use crate::types::{
    IssuedAccessToken, NewTokenPair, RefreshTokenRecord, RevocationReason, SessionContext,
};

/// Lifetimes assigned to newly issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    /// Access token lifetime.
    pub access: Duration,
    /// Refresh token lifetime.
    pub refresh: Duration,
}

/// Issues new chains and rotates existing ones.
#[derive(Clone)]
pub struct RotationValidator {
    ledger: Arc<dyn TokenLedger>,
    revoker: CascadingRevoker,
    audit: Arc<dyn AuditSink>,
    lifetimes: TokenLifetimes,
}

impl RotationValidator {
    /// Creates a validator.
    pub fn new(
        ledger: Arc<dyn TokenLedger>,
        revoker: CascadingRevoker,
        audit: Arc<dyn AuditSink>,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            ledger,
            revoker,
            audit,
            lifetimes,
        }
    }

    /// Starts a new rotation chain for an authenticated user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the record cannot be
    /// tracked.
    pub async fn issue(&self, user_id: &str, context: &SessionContext) -> AuthResult<NewTokenPair> {
        let now = OffsetDateTime::now_utc();
        let pair = self.mint(user_id, None, context, now);
        self.ledger
            .track_refresh_token(&pair.refresh)
            .await
            .map_err(fail_closed)?;

        tracing::debug!(user_id = %user_id, jti = %pair.refresh.jti, "Issued new token chain");
        Ok(pair)
    }

    /// Exchanges a refresh token for a new access/refresh pair.
    ///
    /// # Errors
    ///
    /// - `AuthError::UnknownToken` if the token was never issued or has been
    ///   garbage-collected
    /// - `AuthError::ExpiredToken` if the token is past its expiry
    /// - `AuthError::ReplayDetected` if the token was already consumed; all of
    ///   the user's active sessions have been revoked
    /// - `AuthError::StorageUnavailable` if the ledger fails
    pub async fn rotate(
        &self,
        refresh_jti: &str,
        context: &SessionContext,
    ) -> AuthResult<NewTokenPair> {
        let now = OffsetDateTime::now_utc();

        let record = self
            .ledger
            .find_by_jti(refresh_jti)
            .await
            .map_err(fail_closed)?
            .ok_or(AuthError::UnknownToken)?;

        if record.is_expired_at(now) {
            tracing::debug!(jti = %refresh_jti, user_id = %record.user_id, "Refresh token expired");
            return Err(AuthError::ExpiredToken);
        }

        if record.used {
            return Err(self.handle_reuse(&record, context).await);
        }

        let pair = self.mint(&record.user_id, Some(record.jti.clone()), context, now);
        let won = self
            .ledger
            .consume_and_track(refresh_jti, &pair.refresh, now)
            .await
            .map_err(|e| {
                tracing::error!(
                    jti = %refresh_jti,
                    user_id = %record.user_id,
                    error = %e,
                    "Failed to rotate refresh token"
                );
                fail_closed(e)
            })?;
        if !won {
            return Err(self.handle_reuse(&record, context).await);
        }

        self.audit.record(&SecurityEvent::TokenRotated {
            user_id: record.user_id.clone(),
            parent_jti: record.jti.clone(),
            jti: pair.refresh.jti.clone(),
        });

        Ok(pair)
    }

    async fn handle_reuse(
        &self,
        record: &RefreshTokenRecord,
        presented: &SessionContext,
    ) -> AuthError {
        tracing::warn!(
            jti = %record.jti,
            user_id = %record.user_id,
            presented_ip = presented.client_ip.as_deref().unwrap_or("-"),
            issued_ip = record.client_ip.as_deref().unwrap_or("-"),
            "Refresh token reuse detected, revoking all sessions"
        );
        self.audit.record(&SecurityEvent::RefreshTokenReuse {
            user_id: record.user_id.clone(),
            jti: record.jti.clone(),
            presented: presented.clone(),
            issued: record.session_context(),
        });

        if let Err(e) = self
            .revoker
            .revoke_all(&record.user_id, RevocationReason::ReuseDetected)
            .await
        {
            tracing::error!(
                user_id = %record.user_id,
                error = %e,
                "Failed to revoke sessions after reuse detection"
            );
        }

        AuthError::replay_detected(record.user_id.clone())
    }

    fn mint(
        &self,
        user_id: &str,
        parent_jti: Option<String>,
        context: &SessionContext,
        now: OffsetDateTime,
    ) -> NewTokenPair {
        let refresh =
            RefreshTokenRecord::issue(user_id, parent_jti, self.lifetimes.refresh, context, now);
        let access = IssuedAccessToken {
            jti: RefreshTokenRecord::generate_jti(),
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at: now + self.lifetimes.access.max(Duration::ZERO),
        };
        NewTokenPair { access, refresh }
    }
}

/// Maps any ledger failure on the rotate path to `StorageUnavailable`.
fn fail_closed(err: AuthError) -> AuthError {
    match err {
        AuthError::StorageUnavailable { .. } => err,
        other => AuthError::storage_unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAuditSink;
    use crate::storage::InMemoryTokenLedger;

    fn validator(ledger: Arc<InMemoryTokenLedger>) -> RotationValidator {
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink::default());
        let revoker = CascadingRevoker::new(ledger.clone(), audit.clone());
        RotationValidator::new(
            ledger,
            revoker,
            audit,
            TokenLifetimes {
                access: Duration::minutes(15),
                refresh: Duration::days(7),
            },
        )
    }

    #[tokio::test]
    async fn test_issue_starts_chain() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let pair = validator(ledger.clone())
            .issue("user-1", &SessionContext::default())
            .await
            .unwrap();

        assert!(pair.refresh.is_chain_root());
        assert_eq!(pair.access.user_id, "user-1");
        assert_eq!(
            pair.access.expires_at - pair.access.issued_at,
            Duration::minutes(15)
        );
        assert_ne!(pair.access.jti, pair.refresh.jti);
        assert!(ledger.find_by_jti(&pair.refresh.jti).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rotate_links_child_to_parent() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let validator = validator(ledger.clone());
        let ctx = SessionContext::new(Some("203.0.113.7".to_string()), None);
        let first = validator.issue("user-1", &ctx).await.unwrap();

        let second = validator.rotate(&first.refresh.jti, &ctx).await.unwrap();

        assert_eq!(
            second.refresh.parent_jti.as_deref(),
            Some(first.refresh.jti.as_str())
        );
        assert_eq!(second.refresh.client_ip.as_deref(), Some("203.0.113.7"));
        let parent = ledger.find_by_jti(&first.refresh.jti).await.unwrap().unwrap();
        assert!(parent.used);
    }

    #[tokio::test]
    async fn test_rotate_unknown_token() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let err = validator(ledger)
            .rotate("never-issued", &SessionContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::UnknownToken);
    }

    #[tokio::test]
    async fn test_rotate_expired_token() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let now = OffsetDateTime::now_utc();
        let stale = RefreshTokenRecord::issue(
            "user-1",
            None,
            Duration::days(1),
            &SessionContext::default(),
            now - Duration::days(2),
        );
        ledger.track_refresh_token(&stale).await.unwrap();

        let err = validator(ledger.clone())
            .rotate(&stale.jti, &SessionContext::default())
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::ExpiredToken);
        let stored = ledger.find_by_jti(&stale.jti).await.unwrap().unwrap();
        assert!(!stored.used);
    }

    #[tokio::test]
    async fn test_replay_revokes_descendant() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let validator = validator(ledger.clone());
        let ctx = SessionContext::default();
        let first = validator.issue("user-1", &ctx).await.unwrap();
        let second = validator.rotate(&first.refresh.jti, &ctx).await.unwrap();

        let err = validator.rotate(&first.refresh.jti, &ctx).await.unwrap_err();
        assert_eq!(err, AuthError::replay_detected("user-1"));

        assert!(ledger.is_blacklisted(&second.refresh.jti).await.unwrap());
        let err = validator.rotate(&second.refresh.jti, &ctx).await.unwrap_err();
        assert!(err.is_security_event());
    }

    #[test]
    fn test_fail_closed_mapping() {
        assert_eq!(
            fail_closed(AuthError::storage_unavailable("down")),
            AuthError::storage_unavailable("down")
        );
        assert!(matches!(
            fail_closed(AuthError::conflict("dup")),
            AuthError::StorageUnavailable { .. }
        ));
    }
}
