//! Access token revocation checks.
//!
//! Consulted on every authenticated request after the signature has been
//! verified upstream. The check is a pure read against the blacklist and
//! fails closed: a missing `jti` or an unreachable store denies the token.

use std::sync::Arc;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::TokenLedger;
use crate::types::AccessClaims;

/// Read-only blacklist lookup for access tokens.
#[derive(Clone)]
pub struct RevocationChecker {
    ledger: Arc<dyn TokenLedger>,
}

impl RevocationChecker {
    /// Creates a checker over `ledger`.
    pub fn new(ledger: Arc<dyn TokenLedger>) -> Self {
        Self { ledger }
    }

    /// Returns `true` if the token must be rejected.
    ///
    /// An absent `jti` and a failed lookup both count as revoked.
    pub async fn is_revoked(&self, jti: Option<&str>) -> bool {
        let Some(jti) = jti else {
            tracing::debug!("Token has no jti, treating as revoked");
            return true;
        };

        match self.ledger.is_blacklisted(jti).await {
            Ok(revoked) => {
                if revoked {
                    tracing::debug!(jti = %jti, "Token is revoked");
                }
                revoked
            }
            Err(e) => {
                tracing::error!(jti = %jti, error = %e, "Revocation lookup failed, denying token");
                true
            }
        }
    }

    /// Checks verified access token claims against the blacklist.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` if the claims carry no `jti`
    /// - `AuthError::StorageUnavailable` if the lookup fails
    /// - `AuthError::TokenRevoked` if the token is blacklisted
    pub async fn ensure_not_revoked(&self, claims: &AccessClaims) -> AuthResult<()> {
        let jti = claims
            .jti
            .as_deref()
            .ok_or_else(|| AuthError::invalid_token("access token has no jti claim"))?;

        let revoked = self.ledger.is_blacklisted(jti).await.map_err(|e| {
            tracing::error!(jti = %jti, error = %e, "Revocation lookup failed, denying token");
            AuthError::storage_unavailable(e.to_string())
        })?;

        if revoked {
            tracing::debug!(jti = %jti, user_id = %claims.sub, "Rejected revoked access token");
            return Err(AuthError::TokenRevoked);
        }

        Ok(())
    }
}
