//! Cascading and single-token revocation.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::audit::{AuditSink, SecurityEvent};
use crate::error::AuthError;
use crate::storage::TokenLedger;
use crate::types::{AccessClaims, BlacklistEntry, RevocationReason, TokenType};

/// Revokes refresh token sessions and access tokens.
#[derive(Clone)]
pub struct CascadingRevoker {
    ledger: Arc<dyn TokenLedger>,
    audit: Arc<dyn AuditSink>,
}

impl CascadingRevoker {
    /// Creates a revoker over `ledger` reporting to `audit`.
    pub fn new(ledger: Arc<dyn TokenLedger>, audit: Arc<dyn AuditSink>) -> Self {
        Self { ledger, audit }
    }

    /// Revokes every active refresh token of `user_id`.
    ///
    /// Each unused record is marked consumed and blacklisted in a single
    /// ledger transaction. Returns the number of tokens revoked; records
    /// that were already consumed are not counted.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the ledger fails. In that
    /// case nothing was revoked.
    pub async fn revoke_all(&self, user_id: &str, reason: RevocationReason) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let revoked = self
            .ledger
            .revoke_active_for_user(user_id, reason, now)
            .await?;
        let count = revoked.len() as u64;

        tracing::info!(
            user_id = %user_id,
            reason = %reason,
            count,
            "Revoked all active sessions"
        );
        self.audit.record(&SecurityEvent::SessionsRevoked {
            user_id: user_id.to_string(),
            reason,
            count,
        });

        Ok(count)
    }

    /// Blacklists a single access token until its own expiry.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` if the claims carry no `jti`
    /// - `AuthError::StorageUnavailable` if the ledger fails
    pub async fn revoke_access_token(
        &self,
        claims: &AccessClaims,
        reason: RevocationReason,
    ) -> AuthResult<()> {
        let jti = claims
            .jti
            .as_deref()
            .ok_or_else(|| AuthError::invalid_token("access token has no jti claim"))?;

        let now = OffsetDateTime::now_utc();
        let expires_at = claims.expires_at().unwrap_or(now);
        let entry = BlacklistEntry::new(
            jti,
            TokenType::Access,
            claims.sub.as_str(),
            reason,
            now,
            expires_at,
        );
        self.ledger.add_to_blacklist(&entry).await?;

        tracing::debug!(
            jti = %jti,
            user_id = %claims.sub,
            reason = %reason,
            "Access token revoked"
        );
        self.audit.record(&SecurityEvent::TokenRevoked {
            user_id: claims.sub.clone(),
            jti: jti.to_string(),
            token_type: TokenType::Access,
            reason,
        });

        Ok(())
    }

    /// Revokes one of `owner`'s refresh token sessions (single-device logout).
    ///
    /// Returns `false` if the token is unknown or already consumed.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` if the token belongs to another user;
    ///   nothing is revoked
    /// - `AuthError::StorageUnavailable` if the ledger fails
    pub async fn revoke_session(
        &self,
        jti: &str,
        owner: &str,
        reason: RevocationReason,
    ) -> AuthResult<bool> {
        let Some(record) = self.ledger.find_by_jti(jti).await? else {
            return Ok(false);
        };

        if record.user_id != owner {
            tracing::warn!(
                jti = %jti,
                caller = %owner,
                "Refusing to revoke a refresh token owned by another user"
            );
            return Err(AuthError::invalid_token(
                "refresh token does not belong to the caller",
            ));
        }

        let now = OffsetDateTime::now_utc();
        let revoked = self.ledger.revoke_refresh_token(jti, reason, now).await?;
        if revoked {
            tracing::debug!(
                jti = %jti,
                user_id = %record.user_id,
                reason = %reason,
                "Session revoked"
            );
            self.audit.record(&SecurityEvent::TokenRevoked {
                user_id: record.user_id,
                jti: jti.to_string(),
                token_type: TokenType::Refresh,
                reason,
            });
        }

        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAuditSink;
    use crate::storage::InMemoryTokenLedger;
    use crate::types::{RefreshTokenRecord, SessionContext};
    use time::Duration;

    fn revoker(ledger: Arc<InMemoryTokenLedger>) -> CascadingRevoker {
        CascadingRevoker::new(ledger, Arc::new(TracingAuditSink::default()))
    }

    #[tokio::test]
    async fn test_revoke_all_counts_only_active() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let now = OffsetDateTime::now_utc();
        let ctx = SessionContext::default();
        let a = RefreshTokenRecord::issue("user-1", None, Duration::days(1), &ctx, now);
        let b = RefreshTokenRecord::issue("user-1", None, Duration::days(1), &ctx, now);
        let other = RefreshTokenRecord::issue("user-2", None, Duration::days(1), &ctx, now);
        for r in [&a, &b, &other] {
            ledger.track_refresh_token(r).await.unwrap();
        }
        ledger.mark_used_if_unused(&b.jti, now).await.unwrap();

        let count = revoker(ledger.clone())
            .revoke_all("user-1", RevocationReason::Manual)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(ledger.is_blacklisted(&a.jti).await.unwrap());
        assert!(!ledger.is_blacklisted(&b.jti).await.unwrap());
        assert!(!ledger.is_blacklisted(&other.jti).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_access_token_uses_claim_expiry() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let exp = OffsetDateTime::now_utc().unix_timestamp() + 600;
        let claims = AccessClaims {
            jti: Some("a-1".to_string()),
            sub: "user-1".to_string(),
            exp,
        };

        revoker(ledger.clone())
            .revoke_access_token(&claims, RevocationReason::Logout)
            .await
            .unwrap();

        let entries = ledger.blacklist_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].token_type, TokenType::Access);
        assert_eq!(entries[0].expires_at.unix_timestamp(), exp);
    }

    #[tokio::test]
    async fn test_revoke_access_token_without_jti() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let claims = AccessClaims {
            jti: None,
            sub: "user-1".to_string(),
            exp: 0,
        };
        let err = revoker(ledger)
            .revoke_access_token(&claims, RevocationReason::Logout)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn test_revoke_session_unknown_and_repeat() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let now = OffsetDateTime::now_utc();
        let r = RefreshTokenRecord::issue(
            "user-1",
            None,
            Duration::days(1),
            &SessionContext::default(),
            now,
        );
        ledger.track_refresh_token(&r).await.unwrap();
        let revoker = revoker(ledger.clone());

        assert!(
            !revoker
                .revoke_session("missing", "user-1", RevocationReason::Logout)
                .await
                .unwrap()
        );
        assert!(
            revoker
                .revoke_session(&r.jti, "user-1", RevocationReason::Logout)
                .await
                .unwrap()
        );
        assert!(
            !revoker
                .revoke_session(&r.jti, "user-1", RevocationReason::Logout)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_revoke_session_rejects_other_owner() {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let now = OffsetDateTime::now_utc();
        let bob = RefreshTokenRecord::issue(
            "bob",
            None,
            Duration::days(1),
            &SessionContext::default(),
            now,
        );
        ledger.track_refresh_token(&bob).await.unwrap();

        let err = revoker(ledger.clone())
            .revoke_session(&bob.jti, "alice", RevocationReason::Logout)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidToken { .. }));
        assert!(!ledger.is_blacklisted(&bob.jti).await.unwrap());
        assert!(!ledger.find_by_jti(&bob.jti).await.unwrap().unwrap().used);
    }
}
