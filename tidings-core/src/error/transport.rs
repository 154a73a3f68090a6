//! Transport lifecycle errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors caused by calling a transport in the wrong state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    /// No transport is active.
    #[error("[Transport] Not connected")]
    NotConnected,

    /// The poll transport has no server session yet.
    #[error("[Transport] No active poll session")]
    NoSession,

    /// The transport has already been shut down.
    #[error("[Transport] Transport closed")]
    Closed,

    /// The transport is disabled by configuration or discovery.
    #[error("[Transport] {method} transport unavailable: {reason}")]
    Unavailable {
        /// Transport method name.
        method: String,
        /// Why it is unavailable.
        reason: String,
    },
}

impl TransportError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::NotConnected | Self::NoSession => ErrorSeverity::Warning,
            Self::Closed | Self::Unavailable { .. } => ErrorSeverity::Recoverable,
        }
    }
}
