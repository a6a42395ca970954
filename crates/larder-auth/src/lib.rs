//! # larder-auth
//!
//! Token lifecycle management for the Larder server.
//!
//! This crate provides:
//! - Refresh token rotation with reuse (theft) detection
//! - Access token revocation checks against a blacklist
//! - Cascading revocation of all of a user's sessions
//! - Garbage collection of expired ledger rows
//! - Audit logging for security events
//!
//! Signing and verifying tokens is the caller's job. This crate assigns token
//! ids and lifetimes and records what has been issued, consumed and revoked.
//!
//! ## Modules
//!
//! - [`config`] - Lifetimes, sweeper interval and audit filtering
//! - [`token`] - Checker, rotation, revocation, sweeper and the service facade
//! - [`storage`] - The [`TokenLedger`] trait and the in-memory ledger
//! - [`audit`] - Security event audit logging
//! - [`types`] - Blacklist entries, refresh token records and claims

pub mod audit;
pub mod config;
pub mod error;
pub mod storage;
pub mod token;
pub mod types;

pub use audit::{AuditSink, SecurityEvent, TracingAuditSink};
pub use config::{AuditConfig, ConfigError, TokenLifecycleConfig};
pub use error::{AuthError, ErrorCategory};
pub use storage::{InMemoryTokenLedger, TokenLedger};
pub use token::{
    CascadingRevoker, CleanupSweeper, RevocationChecker, RotationValidator, TokenLifecycleService,
    TokenLifetimes,
};
pub use types::{
    AccessClaims, BlacklistEntry, CleanupReport, IssuedAccessToken, LedgerStats, NewTokenPair,
    RefreshTokenRecord, RevocationReason, SessionContext, TokenType,
};

/// Type alias for token lifecycle results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use larder_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::audit::{AuditSink, SecurityEvent, TracingAuditSink};
    pub use crate::config::{AuditConfig, ConfigError, TokenLifecycleConfig};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::storage::{InMemoryTokenLedger, TokenLedger};
    pub use crate::token::TokenLifecycleService;
    pub use crate::types::{
        AccessClaims, BlacklistEntry, CleanupReport, LedgerStats, NewTokenPair,
        RefreshTokenRecord, RevocationReason, SessionContext, TokenType,
    };
}
