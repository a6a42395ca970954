//! Token lifecycle service.
//!
//! [`TokenLifecycleService`] wires the ledger, the audit sink and the four
//! lifecycle components together. Construct it once at startup and pass it
//! (usually inside an `Arc`) to whatever needs it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use larder_auth::prelude::*;
//!
//! let ledger: Arc<dyn TokenLedger> = Arc::new(InMemoryTokenLedger::new());
//! let config = TokenLifecycleConfig::default();
//! let audit = Arc::new(TracingAuditSink::new(config.audit.clone()));
//! let service = TokenLifecycleService::new(ledger, config, audit)?;
//!
//! let pair = service.login("user-1", &SessionContext::default()).await?;
//! let next = service.rotate(&pair.refresh.jti, &SessionContext::default()).await?;
//! ```

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::watch;

use crate::AuthResult;
use crate::audit::AuditSink;
use crate::config::TokenLifecycleConfig;
use crate::error::AuthError;
use crate::storage::TokenLedger;
use crate::token::checker::RevocationChecker;
use crate::token::revoker::CascadingRevoker;
use crate::token::rotation::{RotationValidator, TokenLifetimes};
use crate::token::sweeper::CleanupSweeper;
use crate::types::{
    AccessClaims, CleanupReport, LedgerStats, NewTokenPair, RefreshTokenRecord, RevocationReason,
    SessionContext,
};

/// Facade over the token lifecycle components.
pub struct TokenLifecycleService {
    ledger: Arc<dyn TokenLedger>,
    config: TokenLifecycleConfig,
    checker: RevocationChecker,
    rotation: RotationValidator,
    revoker: CascadingRevoker,
    sweeper: Arc<CleanupSweeper>,
}

impl TokenLifecycleService {
    /// Creates the service.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if `config` fails validation.
    pub fn new(
        ledger: Arc<dyn TokenLedger>,
        config: TokenLifecycleConfig,
        audit: Arc<dyn AuditSink>,
    ) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let lifetimes = TokenLifetimes {
            access: config.access_lifetime(),
            refresh: config.refresh_lifetime(),
        };
        let checker = RevocationChecker::new(ledger.clone());
        let revoker = CascadingRevoker::new(ledger.clone(), audit.clone());
        let rotation =
            RotationValidator::new(ledger.clone(), revoker.clone(), audit.clone(), lifetimes);
        let sweeper = Arc::new(CleanupSweeper::new(ledger.clone(), audit));

        Ok(Self {
            ledger,
            config,
            checker,
            rotation,
            revoker,
            sweeper,
        })
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &TokenLifecycleConfig {
        &self.config
    }

    /// Starts a new session for a user the identity provider has verified.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the ledger fails.
    pub async fn login(
        &self,
        user_id: &str,
        context: &SessionContext,
    ) -> AuthResult<NewTokenPair> {
        self.rotation.issue(user_id, context).await
    }

    /// Returns `true` if an access token with this `jti` must be rejected.
    pub async fn is_revoked(&self, jti: Option<&str>) -> bool {
        self.checker.is_revoked(jti).await
    }

    /// Checks verified access token claims against the blacklist.
    ///
    /// # Errors
    ///
    /// See [`RevocationChecker::ensure_not_revoked`].
    pub async fn ensure_not_revoked(&self, claims: &AccessClaims) -> AuthResult<()> {
        self.checker.ensure_not_revoked(claims).await
    }

    /// Exchanges a refresh token for a new pair.
    ///
    /// # Errors
    ///
    /// See [`RotationValidator::rotate`].
    pub async fn rotate(
        &self,
        refresh_jti: &str,
        context: &SessionContext,
    ) -> AuthResult<NewTokenPair> {
        self.rotation.rotate(refresh_jti, context).await
    }

    /// Revokes every active session of a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the ledger fails.
    pub async fn revoke_all(&self, user_id: &str, reason: RevocationReason) -> AuthResult<u64> {
        self.revoker.revoke_all(user_id, reason).await
    }

    /// Logs out one device: blacklists the access token and, if given, the
    /// refresh token of the same session.
    ///
    /// The refresh token must belong to `claims.sub`.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` if the access claims carry no `jti` or the
    ///   refresh token belongs to another user; nothing is revoked
    /// - `AuthError::StorageUnavailable` if the ledger fails
    pub async fn logout(&self, claims: &AccessClaims, refresh_jti: Option<&str>) -> AuthResult<()> {
        if claims.jti.is_none() {
            return Err(AuthError::invalid_token("access token has no jti claim"));
        }

        if let Some(jti) = refresh_jti {
            let revoked = self
                .revoker
                .revoke_session(jti, &claims.sub, RevocationReason::Logout)
                .await?;
            if !revoked {
                tracing::debug!(jti = %jti, "Refresh token was not active at logout");
            }
        }

        self.revoker
            .revoke_access_token(claims, RevocationReason::Logout)
            .await
    }

    /// Blacklists one access token.
    ///
    /// # Errors
    ///
    /// See [`CascadingRevoker::revoke_access_token`].
    pub async fn revoke_access_token(
        &self,
        claims: &AccessClaims,
        reason: RevocationReason,
    ) -> AuthResult<()> {
        self.revoker.revoke_access_token(claims, reason).await
    }

    /// Runs one cleanup pass.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the ledger fails.
    pub async fn cleanup(&self) -> AuthResult<CleanupReport> {
        self.sweeper.cleanup().await
    }

    /// Lists a user's active refresh tokens, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the ledger fails.
    pub async fn active_sessions(&self, user_id: &str) -> AuthResult<Vec<RefreshTokenRecord>> {
        self.ledger
            .list_active_for_user(user_id, OffsetDateTime::now_utc())
            .await
    }

    /// Reconstructs the rotation chain ending at `jti`, newest first.
    ///
    /// The walk stops at the chain root, at a parent that has already been
    /// garbage-collected, or after `max_lineage_depth` records.
    ///
    /// # Errors
    ///
    /// - `AuthError::UnknownToken` if `jti` itself is not tracked
    /// - `AuthError::StorageUnavailable` if the ledger fails
    pub async fn lineage(&self, jti: &str) -> AuthResult<Vec<RefreshTokenRecord>> {
        let mut current = self
            .ledger
            .find_by_jti(jti)
            .await?
            .ok_or(AuthError::UnknownToken)?;

        let mut chain = Vec::new();
        loop {
            let parent = current.parent_jti.clone();
            chain.push(current);

            let Some(parent) = parent else { break };
            if chain.len() >= self.config.max_lineage_depth {
                tracing::warn!(jti = %jti, depth = chain.len(), "Lineage walk truncated");
                break;
            }

            match self.ledger.find_by_jti(&parent).await? {
                Some(record) => current = record,
                None => break,
            }
        }

        Ok(chain)
    }

    /// Returns ledger row counts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the ledger fails.
    pub async fn stats(&self) -> AuthResult<LedgerStats> {
        self.ledger.stats(OffsetDateTime::now_utc()).await
    }

    /// Starts the background sweeper at the configured interval.
    ///
    /// Returns the shutdown sender; send `true` to stop it.
    pub fn start_sweeper(&self) -> watch::Sender<bool> {
        self.start_sweeper_every(self.config.cleanup_interval)
    }

    /// Starts the background sweeper with an explicit interval.
    pub fn start_sweeper_every(&self, every: std::time::Duration) -> watch::Sender<bool> {
        self.sweeper.clone().start(every)
    }
}
