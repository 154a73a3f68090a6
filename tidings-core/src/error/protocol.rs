//! Wire protocol error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while encoding, decoding or sequencing frames and REST payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolError {
    /// Inbound payload could not be decoded.
    #[error("[Protocol] Decode failed: {reason}")]
    Decode {
        /// Decoder message.
        reason: String,
    },

    /// Outbound payload could not be encoded.
    #[error("[Protocol] Encode failed: {reason}")]
    Encode {
        /// Encoder message.
        reason: String,
    },

    /// A frame arrived that is not valid in the current state.
    #[error("[Protocol] Unexpected frame '{frame}' while {state}")]
    UnexpectedFrame {
        /// Frame type received.
        frame: String,
        /// State the connection was in.
        state: String,
    },

    /// The server answered the authenticate frame with an error.
    #[error("[Protocol] Handshake rejected: {reason}")]
    HandshakeRejected {
        /// Server-provided reason.
        reason: String,
    },

    /// The server reported `success: false` or an error frame.
    #[error("[Protocol] Server error: {reason}")]
    ServerError {
        /// Server-provided reason.
        reason: String,
    },
}

impl ProtocolError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::Encode { .. } => ErrorSeverity::Fatal,
            Self::HandshakeRejected { .. } | Self::ServerError { .. } => {
                ErrorSeverity::Recoverable
            }
            Self::Decode { .. } | Self::UnexpectedFrame { .. } => ErrorSeverity::Warning,
        }
    }

    /// Creates a decode error from any displayable source.
    #[must_use]
    pub fn decode(reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            reason: reason.to_string(),
        }
    }

    /// Creates an encode error from any displayable source.
    #[must_use]
    pub fn encode(reason: impl std::fmt::Display) -> Self {
        Self::Encode {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_frame_display() {
        let error = ProtocolError::UnexpectedFrame {
            frame: "message".to_string(),
            state: "authenticating".to_string(),
        };
        let display = error.to_string();
        assert!(display.contains("message"));
        assert!(display.contains("authenticating"));
    }

    #[test]
    fn test_helpers() {
        assert!(matches!(
            ProtocolError::decode("eof"),
            ProtocolError::Decode { reason } if reason == "eof"
        ));
        assert!(ProtocolError::encode("bad").severity().is_fatal());
    }
}
