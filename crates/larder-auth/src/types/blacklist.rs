//! Blacklist entries.
//!
//! A blacklist entry is terminal: once written it is never updated and never
//! removed before its `expires_at`. After that point the token it describes
//! would be rejected on expiry anyway, so the sweeper may delete the row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AuthError;

/// Kind of token a blacklist entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived bearer token presented on every request.
    Access,
    /// Long-lived token exchanged for a new pair.
    Refresh,
}

impl TokenType {
    /// Returns the stored representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(AuthError::internal(format!("unknown token type '{other}'"))),
        }
    }
}

/// Why a token was revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// The user logged out (one device or everywhere).
    Logout,
    /// A consumed refresh token was presented again.
    ReuseDetected,
    /// Revoked by the user or support staff.
    Manual,
    /// Revoked by an administrative bulk operation.
    AdminSweep,
}

impl RevocationReason {
    /// Returns the stored representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::ReuseDetected => "reuse_detected",
            Self::Manual => "manual",
            Self::AdminSweep => "admin_sweep",
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevocationReason {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logout" => Ok(Self::Logout),
            "reuse_detected" => Ok(Self::ReuseDetected),
            "manual" => Ok(Self::Manual),
            "admin_sweep" => Ok(Self::AdminSweep),
            other => Err(AuthError::internal(format!(
                "unknown revocation reason '{other}'"
            ))),
        }
    }
}

/// A revoked token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    /// Identifier of the revoked token.
    pub jti: String,
    /// Access or refresh.
    pub token_type: TokenType,
    /// Owner of the token.
    pub user_id: String,
    /// When the revocation was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub revoked_at: OffsetDateTime,
    /// When the token would have expired naturally.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// Why it was revoked.
    pub reason: RevocationReason,
}

impl BlacklistEntry {
    /// Creates an entry revoked at `revoked_at`.
    ///
    /// `expires_at` is clamped so it is never earlier than `revoked_at`.
    #[must_use]
    pub fn new(
        jti: impl Into<String>,
        token_type: TokenType,
        user_id: impl Into<String>,
        reason: RevocationReason,
        revoked_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            jti: jti.into(),
            token_type,
            user_id: user_id.into(),
            revoked_at,
            expires_at: expires_at.max(revoked_at),
            reason,
        }
    }

    /// Returns `true` once the entry can be garbage-collected.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }
}
