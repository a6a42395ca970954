//! Security event audit logging.
//!
//! This module provides audit records for token lifecycle events:
//!
//! - Refresh token reuse (suspected theft)
//! - Cascading and single-session revocations
//! - Access token revocations
//! - Ledger cleanup passes
//!
//! Events are handed to an [`AuditSink`]. The default [`TracingAuditSink`]
//! writes them as structured `tracing` records on the `larder::audit`
//! target; forwarding them to an alerting system is left to the deployment.

use serde::Serialize;

use crate::config::AuditConfig;
use crate::types::{CleanupReport, RevocationReason, SessionContext, TokenType};

/// Tracing target used for audit records.
pub const AUDIT_TARGET: &str = "larder::audit";

/// A security-relevant token lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SecurityEvent {
    /// A consumed refresh token was presented again.
    RefreshTokenReuse {
        /// Owner of the token.
        user_id: String,
        /// The replayed token.
        jti: String,
        /// Context of the request that replayed the token.
        presented: SessionContext,
        /// Context the token was originally issued under.
        issued: SessionContext,
    },

    /// A refresh token was rotated.
    TokenRotated {
        /// Owner of the chain.
        user_id: String,
        /// The consumed token.
        parent_jti: String,
        /// The newly issued token.
        jti: String,
    },

    /// All active sessions of a user were revoked.
    SessionsRevoked {
        /// Affected user.
        user_id: String,
        /// Why the sessions were revoked.
        reason: RevocationReason,
        /// Number of refresh tokens revoked.
        count: u64,
    },

    /// A single token was blacklisted.
    TokenRevoked {
        /// Owner of the token.
        user_id: String,
        /// The revoked token.
        jti: String,
        /// Access or refresh.
        token_type: TokenType,
        /// Why the token was revoked.
        reason: RevocationReason,
    },

    /// Expired ledger rows were garbage-collected.
    LedgerSwept {
        /// Expired blacklist rows deleted.
        blacklist_removed: u64,
        /// Expired tracking rows deleted.
        tracking_removed: u64,
    },
}

impl SecurityEvent {
    /// Builds a sweep event from a cleanup report.
    #[must_use]
    pub fn swept(report: CleanupReport) -> Self {
        Self::LedgerSwept {
            blacklist_removed: report.blacklist_removed,
            tracking_removed: report.tracking_removed,
        }
    }

    /// Short event name, matching the serialized `event` tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RefreshTokenReuse { .. } => "refresh_token_reuse",
            Self::TokenRotated { .. } => "token_rotated",
            Self::SessionsRevoked { .. } => "sessions_revoked",
            Self::TokenRevoked { .. } => "token_revoked",
            Self::LedgerSwept { .. } => "ledger_swept",
        }
    }

    /// Returns `true` for events that should page someone.
    #[must_use]
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::RefreshTokenReuse { .. })
    }
}

/// Destination for security events.
pub trait AuditSink: Send + Sync {
    /// Records one event. Must not fail the calling operation.
    fn record(&self, event: &SecurityEvent);
}

/// Audit sink that emits events through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink {
    config: AuditConfig,
}

impl TracingAuditSink {
    /// Creates a sink filtered by `config`.
    #[must_use]
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    fn enabled(&self, event: &SecurityEvent) -> bool {
        match event {
            SecurityEvent::RefreshTokenReuse { .. } => true,
            SecurityEvent::TokenRotated { .. } => self.config.log_rotations,
            SecurityEvent::SessionsRevoked { .. } | SecurityEvent::TokenRevoked { .. } => {
                self.config.log_revocations
            }
            SecurityEvent::LedgerSwept { .. } => self.config.log_cleanup,
        }
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &SecurityEvent) {
        if !self.enabled(event) {
            return;
        }

        let payload = serde_json::to_string(event).unwrap_or_else(|_| event.name().to_string());
        if event.is_alert() {
            tracing::warn!(target: AUDIT_TARGET, event = event.name(), %payload, "security event");
        } else {
            tracing::info!(
                target: AUDIT_TARGET,
                event = event.name(),
                %payload,
                "token lifecycle event"
            );
        }
    }
}
