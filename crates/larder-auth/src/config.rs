//! Token lifecycle configuration.
//!
//! Lifetimes are written in humantime notation (`"15m"`, `"7d"`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the token lifecycle subsystem.
///
/// # Example (TOML)
///
/// ```toml
/// [tokens]
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "7d"
/// cleanup_interval = "1h"
///
/// [tokens.audit]
/// log_rotations = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenLifecycleConfig {
    /// Lifetime of access tokens minted on login and rotation.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Lifetime of each refresh token in a rotation chain.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// How often the background sweeper deletes expired ledger rows.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,

    /// Upper bound on parent links followed when reconstructing a chain.
    pub max_lineage_depth: usize,

    /// Audit event filtering.
    pub audit: AuditConfig,
}

impl Default for TokenLifecycleConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 3600), // 7 days
            cleanup_interval: Duration::from_secs(3600),         // 1 hour
            max_lineage_depth: 1024,
            audit: AuditConfig::default(),
        }
    }
}

impl TokenLifecycleConfig {
    /// Access token lifetime as a signed duration.
    #[must_use]
    pub fn access_lifetime(&self) -> time::Duration {
        to_time_duration(self.access_token_lifetime)
    }

    /// Refresh token lifetime as a signed duration.
    #[must_use]
    pub fn refresh_lifetime(&self) -> time::Duration {
        to_time_duration(self.refresh_token_lifetime)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - A lifetime or the cleanup interval is zero
    /// - The refresh lifetime is shorter than the access lifetime
    /// - `max_lineage_depth` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.refresh_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "refresh_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.refresh_token_lifetime < self.access_token_lifetime {
            return Err(ConfigError::InvalidValue(
                "refresh_token_lifetime must be >= access_token_lifetime".to_string(),
            ));
        }

        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "cleanup_interval must be > 0".to_string(),
            ));
        }

        if self.max_lineage_depth == 0 {
            return Err(ConfigError::InvalidValue(
                "max_lineage_depth must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Audit configuration.
///
/// Reuse detection is always audited; the flags below control the
/// lower-severity events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Log every successful rotation.
    pub log_rotations: bool,

    /// Log revocations (logout, revoke-all, access token blacklisting).
    pub log_revocations: bool,

    /// Log cleanup passes.
    pub log_cleanup: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_rotations: false,
            log_revocations: true,
            log_cleanup: true,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

fn to_time_duration(duration: Duration) -> time::Duration {
    time::Duration::try_from(duration).unwrap_or(time::Duration::MAX)
}
