//! Network-related error types.
//!
//! Covers socket establishment, HTTP responses from the realtime endpoints
//! and unexpected connection closure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Network error type for socket and HTTP operations.
///
/// ```
/// use tidings_core::error::NetworkError;
///
/// let error = NetworkError::ConnectionFailed {
///     reason: "Connection refused".to_string(),
/// };
/// assert!(error.to_string().contains("Connection refused"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkError {
    /// Connection to remote host failed.
    #[error("[Network] Connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for the connection failure.
        reason: String,
    },

    /// Operation timed out.
    #[error("[Network] Timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// WebSocket error occurred.
    #[error("[Network] WebSocket error: {reason}")]
    WebSocket {
        /// Reason for the WebSocket error.
        reason: String,
    },

    /// HTTP request returned a non-success status.
    #[error("[Network] HTTP error: status {status_code} - {reason}")]
    Http {
        /// HTTP status code.
        status_code: u16,
        /// Reason for the HTTP error.
        reason: String,
    },

    /// Connection was closed by the peer.
    #[error("[Network] Connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for the connection closure.
        reason: String,
    },

    /// Endpoint URL could not be built.
    #[error("[Network] Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Reason the URL is invalid.
        reason: String,
    },
}

impl NetworkError {
    /// Returns true if this error is recoverable (can be retried).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity().is_recoverable()
    }

    /// Returns true for HTTP 401 and 403 responses.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Http { status_code: 401 | 403, .. })
    }

    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::InvalidUrl { .. } => ErrorSeverity::Fatal,
            Self::Timeout { .. }
            | Self::ConnectionFailed { .. }
            | Self::ConnectionClosed { .. }
            | Self::WebSocket { .. } => ErrorSeverity::Recoverable,
            Self::Http { status_code, .. } if *status_code >= 500 => ErrorSeverity::Recoverable,
            Self::Http { .. } => ErrorSeverity::Warning,
        }
    }

    /// Returns a suggested retry delay in milliseconds, if applicable.
    #[must_use]
    pub fn suggested_retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Timeout { timeout_ms } => Some(*timeout_ms / 2),
            Self::ConnectionFailed { .. } | Self::ConnectionClosed { .. } => Some(1000),
            Self::WebSocket { .. } => Some(500),
            Self::Http { status_code, .. } if *status_code >= 500 => Some(2000),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorSeverity;

    #[test]
    fn test_connection_failed() {
        let error = NetworkError::ConnectionFailed {
            reason: "Connection refused".to_string(),
        };
        assert!(error.to_string().contains("Connection refused"));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_timeout() {
        let error = NetworkError::Timeout { timeout_ms: 5000 };
        assert!(error.to_string().contains("5000ms"));
        assert_eq!(error.suggested_retry_delay_ms(), Some(2500));
    }

    #[test]
    fn test_http_severity_by_status() {
        let server = NetworkError::Http {
            status_code: 503,
            reason: "Service Unavailable".to_string(),
        };
        assert_eq!(server.severity(), ErrorSeverity::Recoverable);

        let client = NetworkError::Http {
            status_code: 404,
            reason: "Not Found".to_string(),
        };
        assert_eq!(client.severity(), ErrorSeverity::Warning);
        assert!(!client.is_auth_rejection());
    }

    #[test]
    fn test_auth_rejection_statuses() {
        for status_code in [401, 403] {
            let error = NetworkError::Http {
                status_code,
                reason: String::new(),
            };
            assert!(error.is_auth_rejection());
        }
    }

    #[test]
    fn test_invalid_url_is_fatal() {
        let error = NetworkError::InvalidUrl {
            url: "::".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert!(!error.is_recoverable());
    }
}
