//! Token lifecycle error types.
//!
//! Every failure on the check, rotate and revoke paths surfaces as an
//! [`AuthError`]. The four rotation outcomes (`UnknownToken`,
//! `ReplayDetected`, `ExpiredToken`, `StorageUnavailable`) are authentication
//! failures: the client must re-authenticate from scratch and the caller
//! must not retry automatically.

use std::fmt;

/// Errors that can occur while managing token lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The presented refresh token has no tracking record.
    #[error("Unknown token")]
    UnknownToken,

    /// The presented refresh token was already consumed.
    ///
    /// This is treated as evidence of token theft: all of the user's active
    /// sessions are revoked before this error is returned.
    #[error("Refresh token reuse detected for user {user_id}")]
    ReplayDetected {
        /// Owner of the replayed token.
        user_id: String,
    },

    /// The presented token is past its expiry.
    #[error("Token expired")]
    ExpiredToken,

    /// The token has been explicitly revoked.
    #[error("Token revoked")]
    TokenRevoked,

    /// The token claims are malformed (e.g. no `jti`).
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The backing store could not be reached or returned an error.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Description of the storage failure.
        message: String,
    },

    /// A record with the same identifier already exists.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `ReplayDetected` error.
    #[must_use]
    pub fn replay_detected(user_id: impl Into<String>) -> Self {
        Self::ReplayDetected {
            user_id: user_id.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `StorageUnavailable` error.
    #[must_use]
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownToken
                | Self::ReplayDetected { .. }
                | Self::ExpiredToken
                | Self::TokenRevoked
                | Self::InvalidToken { .. }
                | Self::Conflict { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if the client must discard its tokens and log in again.
    ///
    /// Storage failures are included: the check and rotate paths fail
    /// closed, so an unreachable store denies the request like a bad token.
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::UnknownToken
                | Self::ReplayDetected { .. }
                | Self::ExpiredToken
                | Self::TokenRevoked
                | Self::InvalidToken { .. }
                | Self::StorageUnavailable { .. }
        )
    }

    /// Returns `true` if this error indicates a likely credential compromise.
    #[must_use]
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::ReplayDetected { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownToken => ErrorCategory::Token,
            Self::ReplayDetected { .. } => ErrorCategory::Security,
            Self::ExpiredToken => ErrorCategory::Token,
            Self::TokenRevoked => ErrorCategory::Token,
            Self::InvalidToken { .. } => ErrorCategory::Validation,
            Self::StorageUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::Conflict { .. } => ErrorCategory::Validation,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 error code the HTTP layer should report.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::UnknownToken => "invalid_grant",
            Self::ReplayDetected { .. } => "invalid_grant",
            Self::ExpiredToken => "invalid_grant",
            Self::TokenRevoked => "invalid_token",
            Self::InvalidToken { .. } => "invalid_token",
            Self::StorageUnavailable { .. } => "server_error",
            Self::Conflict { .. } => "invalid_request",
            Self::Configuration { .. } => "server_error",
            Self::Internal { .. } => "server_error",
        }
    }
}

/// Categories of token lifecycle errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Token state errors (unknown, expired, revoked).
    Token,
    /// Suspected credential compromise.
    Security,
    /// Malformed input.
    Validation,
    /// Backing store errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Security => write!(f, "security"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::UnknownToken.to_string(), "Unknown token");
        assert_eq!(AuthError::ExpiredToken.to_string(), "Token expired");
        assert_eq!(
            AuthError::replay_detected("user-1").to_string(),
            "Refresh token reuse detected for user user-1"
        );
        assert_eq!(
            AuthError::storage_unavailable("connection refused").to_string(),
            "Storage unavailable: connection refused"
        );
    }

    #[test]
    fn test_rotation_failures_require_reauthentication() {
        for err in [
            AuthError::UnknownToken,
            AuthError::replay_detected("user-1"),
            AuthError::ExpiredToken,
            AuthError::storage_unavailable("down"),
        ] {
            assert!(err.requires_reauthentication(), "{err} should force login");
        }

        assert!(!AuthError::conflict("dup").requires_reauthentication());
        assert!(!AuthError::configuration("bad").requires_reauthentication());
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::replay_detected("user-1");
        assert!(err.is_client_error());
        assert!(err.is_security_event());
        assert!(!err.is_server_error());

        let err = AuthError::storage_unavailable("pool timed out");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());
        assert!(!err.is_security_event());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(AuthError::UnknownToken.category(), ErrorCategory::Token);
        assert_eq!(
            AuthError::replay_detected("u").category(),
            ErrorCategory::Security
        );
        assert_eq!(
            AuthError::storage_unavailable("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::Security.to_string(), "security");
    }

    #[test]
    fn test_oauth_error_code() {
        assert_eq!(AuthError::UnknownToken.oauth_error_code(), "invalid_grant");
        assert_eq!(
            AuthError::replay_detected("u").oauth_error_code(),
            "invalid_grant"
        );
        assert_eq!(AuthError::TokenRevoked.oauth_error_code(), "invalid_token");
        assert_eq!(
            AuthError::storage_unavailable("x").oauth_error_code(),
            "server_error"
        );
    }
}
