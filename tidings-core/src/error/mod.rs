//! Error types and handling framework.
//!
//! This module provides a hierarchical error type system with
//! domain-specific error categories for the real-time client.
//!
//! # Error Hierarchy
//!
//! - TidingsError - Top-level error type
//!   - NetworkError - Connection, HTTP and socket errors
//!   - CredentialError - Missing or rejected auth tokens
//!   - ProtocolError - Malformed or unexpected frames and payloads
//!   - TransportError - Transport lifecycle misuse (not ready, no session)
//!   - ConfigError - Configuration errors
//!
//! ```
//! use tidings_core::error::{NetworkError, TidingsError};
//!
//! let error: TidingsError = NetworkError::Http {
//!     status_code: 403,
//!     reason: "nonce expired".to_string(),
//! }
//! .into();
//! assert!(error.is_auth_rejection());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error severity levels for categorizing errors.
///
/// - `Fatal`: Unrecoverable errors; retrying will not help
/// - `Recoverable`: Errors that can be retried or recovered from
/// - `Warning`: Non-critical issues that should be logged
/// - `Info`: Informational messages about expected conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Unrecoverable error.
    Fatal,

    /// Error that can be recovered from through retry or fallback.
    #[default]
    Recoverable,

    /// Non-critical issue, may indicate degraded functionality.
    Warning,

    /// Expected or handled condition.
    Info,
}

impl ErrorSeverity {
    /// Returns true if this error is recoverable (not fatal).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }

    /// Returns true if this error is fatal (unrecoverable).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Returns the severity as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Recoverable => "RECOVERABLE",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

mod config;
mod credential;
mod network;
mod protocol;
mod transport;

pub use config::ConfigError;
pub use credential::CredentialError;
pub use network::NetworkError;
pub use protocol::ProtocolError;
pub use transport::TransportError;

/// Top-level error type for the real-time client.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TidingsError {
    /// Network-related error.
    #[error("{0}")]
    Network(#[from] NetworkError),

    /// Credential error.
    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// Wire protocol error.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Transport lifecycle error.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl TidingsError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Network(e) => e.severity(),
            Self::Credential(e) => e.severity(),
            Self::Protocol(e) => e.severity(),
            Self::Transport(e) => e.severity(),
            Self::Config(e) => e.severity(),
        }
    }

    /// Returns true if this error is recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity().is_recoverable()
    }

    /// Returns true if the server refused the credential that was presented.
    ///
    /// Covers HTTP 401/403 responses, explicit credential rejections and
    /// socket handshakes answered with an error frame.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            Self::Network(e) => e.is_auth_rejection(),
            Self::Credential(e) => matches!(e, CredentialError::Rejected { .. }),
            Self::Protocol(e) => matches!(e, ProtocolError::HandshakeRejected { .. }),
            Self::Transport(_) | Self::Config(_) => false,
        }
    }

    /// Returns a suggested retry delay in milliseconds, if applicable.
    #[must_use]
    pub fn suggested_retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Network(e) => e.suggested_retry_delay_ms(),
            Self::Credential(e) => e.suggested_retry_delay_ms(),
            Self::Protocol(_) | Self::Transport(_) | Self::Config(_) => None,
        }
    }

    /// Returns the error category as a string.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Credential(_) => "credential",
            Self::Protocol(_) => "protocol",
            Self::Transport(_) => "transport",
            Self::Config(_) => "config",
        }
    }

    /// Returns the inner network error, if this is a network error.
    #[must_use]
    pub fn as_network_error(&self) -> Option<&NetworkError> {
        match self {
            Self::Network(e) => Some(e),
            _ => None,
        }
    }
}

/// A specialized Result type for tidings operations.
pub type Result<T> = std::result::Result<T, TidingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity_display() {
        assert_eq!(ErrorSeverity::Fatal.to_string(), "FATAL");
        assert_eq!(ErrorSeverity::Recoverable.to_string(), "RECOVERABLE");
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARNING");
        assert_eq!(ErrorSeverity::Info.to_string(), "INFO");
    }

    #[test]
    fn test_network_error_conversion() {
        let network_err = NetworkError::Timeout { timeout_ms: 5000 };
        let err: TidingsError = network_err.clone().into();
        assert_eq!(err.category(), "network");
        assert_eq!(err.as_network_error(), Some(&network_err));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_auth_rejection_detection() {
        let unauthorized = TidingsError::from(NetworkError::Http {
            status_code: 401,
            reason: "Unauthorized".to_string(),
        });
        assert!(unauthorized.is_auth_rejection());

        let server = TidingsError::from(NetworkError::Http {
            status_code: 502,
            reason: "Bad Gateway".to_string(),
        });
        assert!(!server.is_auth_rejection());

        let handshake = TidingsError::from(ProtocolError::HandshakeRejected {
            reason: "invalid nonce".to_string(),
        });
        assert!(handshake.is_auth_rejection());

        let rejected = TidingsError::from(CredentialError::Rejected { status_code: 403 });
        assert!(rejected.is_auth_rejection());

        let timeout = TidingsError::from(NetworkError::Timeout { timeout_ms: 10 });
        assert!(!timeout.is_auth_rejection());
    }

    #[test]
    fn test_category_per_variant() {
        assert_eq!(
            TidingsError::from(CredentialError::Unavailable).category(),
            "credential"
        );
        assert_eq!(
            TidingsError::from(TransportError::NotConnected).category(),
            "transport"
        );
        assert_eq!(
            TidingsError::from(ConfigError::missing_field("base_url")).category(),
            "config"
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let err = TidingsError::Network(NetworkError::Timeout { timeout_ms: 3000 });
        let json = serde_json::to_string(&err).unwrap();
        let parsed: TidingsError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, parsed);
    }

    #[test]
    fn test_display() {
        let err = TidingsError::Network(NetworkError::Timeout { timeout_ms: 5000 });
        assert!(err.to_string().contains("5000ms"));
    }
}
