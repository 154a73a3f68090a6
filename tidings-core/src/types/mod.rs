//! Domain types shared by transports, the supervisor and the router.
//!
//! # Types
//!
//! - [`Channel`] - Named pub/sub topic with a routing namespace
//! - [`MessageCategory`] - Routing category derived from kind or channel prefix
//! - [`Message`] - An inbound message after transport framing is removed
//! - [`MessageKind`] - Domain message type
//! - [`Token`] - Opaque, shape-checked auth token
//! - [`TransportMethod`] - Which transport carries messages

mod channel;
mod message;
mod token;

pub use channel::{Channel, MessageCategory};
pub use message::{Message, MessageKind};
pub use token::Token;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation error for `NewType` construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Channel name is empty
    #[error("channel cannot be empty")]
    EmptyChannel,

    /// Channel name contains characters that cannot appear in a topic
    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    /// Token is empty
    #[error("token cannot be empty")]
    EmptyToken,

    /// Token length falls outside the accepted window
    #[error("token length {len} outside {min}..={max}")]
    TokenLength {
        /// Actual length.
        len: usize,
        /// Minimum accepted length.
        min: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// Token contains whitespace or control characters
    #[error("token contains whitespace or control characters")]
    TokenCharacters,
}

/// Transport carrying realtime traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMethod {
    /// Persistent WebSocket connection.
    Socket,
    /// HTTP long-poll session.
    Poll,
}

impl TransportMethod {
    /// Returns the method name used in logs, metrics and UI events.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Socket => "socket",
            Self::Poll => "poll",
        }
    }
}

impl fmt::Display for TransportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
