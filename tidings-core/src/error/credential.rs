//! Credential error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while obtaining or presenting an auth token.
///
/// The credential provider itself never surfaces these to callers; a missing
/// token is an `Option::None`. Token sources and transports use them to
/// explain why a token was skipped or refused.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialError {
    /// No source produced a token.
    #[error("[Credential] No token available")]
    Unavailable,

    /// A candidate token failed the shape check.
    #[error("[Credential] Invalid token shape: {reason}")]
    InvalidShape {
        /// Why the token was refused.
        reason: String,
    },

    /// The server refused the token.
    #[error("[Credential] Token rejected with status {status_code}")]
    Rejected {
        /// HTTP status returned by the server.
        status_code: u16,
    },

    /// A token source failed to produce a value.
    #[error("[Credential] Source '{source_name}' failed: {reason}")]
    SourceFailed {
        /// Name of the failing source.
        source_name: String,
        /// Failure detail.
        reason: String,
    },
}

impl CredentialError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::Unavailable | Self::InvalidShape { .. } => ErrorSeverity::Warning,
            Self::Rejected { .. } | Self::SourceFailed { .. } => ErrorSeverity::Recoverable,
        }
    }

    /// Returns a suggested retry delay in milliseconds, if applicable.
    #[must_use]
    pub fn suggested_retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::SourceFailed { .. } => Some(1000),
            Self::Rejected { .. } => Some(0),
            _ => None,
        }
    }
}
