//! Domain types shared by the ledger and the lifecycle components.
//!
//! ## Domain Types
//!
//! - [`BlacklistEntry`] - Terminal revocation record for an access or refresh token
//! - [`RefreshTokenRecord`] - One link in a refresh token rotation chain
//! - [`AccessClaims`] - Verified access-token claims consulted on revocation
//! - [`NewTokenPair`] - Result of a login or a successful rotation

pub mod blacklist;
pub mod claims;
pub mod refresh_token;

pub use blacklist::{BlacklistEntry, RevocationReason, TokenType};
pub use claims::{AccessClaims, IssuedAccessToken, NewTokenPair};
pub use refresh_token::{RefreshTokenRecord, SessionContext};

use serde::{Deserialize, Serialize};

/// Number of rows removed by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Expired blacklist entries deleted.
    pub blacklist_removed: u64,
    /// Expired refresh token tracking records deleted.
    pub tracking_removed: u64,
}

impl CleanupReport {
    /// Total number of rows removed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.blacklist_removed + self.tracking_removed
    }
}

/// Row counts reported to operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    /// Rows in the blacklist.
    pub blacklist_entries: u64,
    /// Rows in the refresh token tracking table.
    pub tracked_tokens: u64,
    /// Tracking rows that are unused and unexpired.
    pub active_tokens: u64,
}
