//! Refresh token tracking records.
//!
//! Every refresh token handed to a client has one tracking record. Records
//! link to the token they replaced through `parent_jti`, forming a rotation
//! chain. A record moves from issued (`used = false`) to consumed
//! (`used = true`) exactly once; there is no way back.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Request metadata captured when a token is issued or presented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Client IP address as seen by the HTTP layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    /// Raw `User-Agent` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl SessionContext {
    /// Creates a context from request metadata.
    #[must_use]
    pub fn new(client_ip: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            client_ip,
            user_agent,
        }
    }
}

/// Tracking record for one refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    /// Identifier carried in the token's `jti` claim.
    pub jti: String,

    /// Owner of the token.
    pub user_id: String,

    /// The refresh token this one replaced (`None` at the start of a chain).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_jti: Option<String>,

    /// Whether the token has been consumed (rotated or revoked).
    pub used: bool,

    /// When the token was consumed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub used_at: Option<OffsetDateTime>,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Client IP at issuance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,

    /// User agent at issuance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RefreshTokenRecord {
    /// Issues a fresh, unused record with a random `jti`.
    ///
    /// A negative `lifetime` is treated as zero so that `expires_at` is never
    /// earlier than `created_at`.
    #[must_use]
    pub fn issue(
        user_id: impl Into<String>,
        parent_jti: Option<String>,
        lifetime: Duration,
        context: &SessionContext,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            jti: Self::generate_jti(),
            user_id: user_id.into(),
            parent_jti,
            used: false,
            used_at: None,
            created_at: now,
            expires_at: now + lifetime.max(Duration::ZERO),
            client_ip: context.client_ip.clone(),
            user_agent: context.user_agent.clone(),
        }
    }

    /// Generates a new random token identifier.
    #[must_use]
    pub fn generate_jti() -> String {
        Uuid::new_v4().to_string()
    }

    /// Returns `true` if the token is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }

    /// Returns `true` if the token can still be rotated at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        !self.used && !self.is_expired_at(now)
    }

    /// Returns `true` if this record starts a rotation chain.
    #[must_use]
    pub fn is_chain_root(&self) -> bool {
        self.parent_jti.is_none()
    }

    /// The context the token was issued under.
    #[must_use]
    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(self.client_ip.clone(), self.user_agent.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SessionContext {
        SessionContext::new(
            Some("203.0.113.7".to_string()),
            Some("larder-ios/3.2".to_string()),
        )
    }

    #[test]
    fn test_issue_starts_unused() {
        let now = OffsetDateTime::now_utc();
        let record = RefreshTokenRecord::issue("user-1", None, Duration::days(7), &context(), now);

        assert!(!record.used);
        assert!(record.used_at.is_none());
        assert!(record.is_chain_root());
        assert_eq!(record.created_at, now);
        assert_eq!(record.expires_at, now + Duration::days(7));
        assert_eq!(record.client_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(record.session_context(), context());
    }

    #[test]
    fn test_negative_lifetime_clamped() {
        let now = OffsetDateTime::now_utc();
        let record =
            RefreshTokenRecord::issue("user-1", None, Duration::hours(-1), &context(), now);
        assert_eq!(record.expires_at, record.created_at);
    }

    #[test]
    fn test_generate_jti_uniqueness() {
        let mut jtis: Vec<String> = (0..100).map(|_| RefreshTokenRecord::generate_jti()).collect();
        jtis.sort();
        jtis.dedup();
        assert_eq!(jtis.len(), 100);
    }

    #[test]
    fn test_is_active() {
        let now = OffsetDateTime::now_utc();
        let mut record =
            RefreshTokenRecord::issue("user-1", None, Duration::hours(1), &context(), now);
        assert!(record.is_active_at(now));
        assert!(!record.is_active_at(now + Duration::hours(2)));

        record.used = true;
        assert!(!record.is_active_at(now));
    }

    #[test]
    fn test_child_links_to_parent() {
        let now = OffsetDateTime::now_utc();
        let parent = RefreshTokenRecord::issue("user-1", None, Duration::days(1), &context(), now);
        let child = RefreshTokenRecord::issue(
            "user-1",
            Some(parent.jti.clone()),
            Duration::days(1),
            &SessionContext::default(),
            now,
        );
        assert_eq!(child.parent_jti.as_deref(), Some(parent.jti.as_str()));
        assert!(!child.is_chain_root());
    }
}
