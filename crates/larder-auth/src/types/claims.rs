//! Access token claims and freshly issued token pairs.
//!
//! Signing and signature verification happen upstream. These types carry
//! only the identifiers and lifetimes this crate assigns or consults.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::refresh_token::RefreshTokenRecord;

/// Claims of an already-verified access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Token identifier. Tokens without one are always treated as revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Subject (user id).
    pub sub: String,

    /// Expiration time (Unix seconds).
    pub exp: i64,
}

impl AccessClaims {
    /// Expiration as a timestamp, or `None` if `exp` is out of range.
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.exp).ok()
    }
}

/// Access token identity minted alongside a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedAccessToken {
    /// Value for the `jti` claim.
    pub jti: String,
    /// Value for the `sub` claim.
    pub user_id: String,
    /// Value for the `iat` claim.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    /// Value for the `exp` claim.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl IssuedAccessToken {
    /// Claims the caller should sign into the access JWT.
    #[must_use]
    pub fn claims(&self) -> AccessClaims {
        AccessClaims {
            jti: Some(self.jti.clone()),
            sub: self.user_id.clone(),
            exp: self.expires_at.unix_timestamp(),
        }
    }
}

/// Access and refresh token produced by login or rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTokenPair {
    /// The new access token.
    pub access: IssuedAccessToken,
    /// The tracking record of the new refresh token.
    pub refresh: RefreshTokenRecord,
}
