//! Socket wire frames.
//!
//! Every frame is a JSON object with a `type` discriminator. Unknown types
//! decode to [`Frame::Unknown`] so newer servers do not break older clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidings_core::error::ProtocolError;
use tidings_core::types::{Channel, Message};

/// Fallback message type when neither the frame nor the payload names one.
pub const DEFAULT_MESSAGE_TYPE: &str = "message";

/// A socket frame in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Client -> server: first frame after the socket opens.
    Authenticate {
        /// Credential token.
        token: String,
    },
    /// Server -> client: handshake accepted.
    Authenticated,
    /// Client -> server.
    Subscribe {
        /// Channel to join.
        channel: Channel,
    },
    /// Server -> client: subscription acknowledged.
    Subscribed {
        /// Channel joined.
        channel: Channel,
    },
    /// Client -> server.
    Unsubscribe {
        /// Channel to leave.
        channel: Channel,
    },
    /// Client -> server.
    Publish {
        /// Target channel.
        channel: Channel,
        /// Payload.
        data: Value,
        /// Explicit message type.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_type: Option<String>,
    },
    /// Server -> client: a message on a subscribed channel.
    Message {
        /// Source channel.
        channel: Channel,
        /// Payload, possibly wrapping `{type, data}`.
        #[serde(default)]
        data: Value,
        /// Explicit message type.
        #[serde(default)]
        message_type: Option<String>,
    },
    /// Heartbeat request, either direction.
    Ping,
    /// Heartbeat reply, either direction.
    Pong,
    /// Server -> client: error report.
    Error {
        /// Server-provided description.
        #[serde(default)]
        message: String,
    },
    /// Anything this client does not understand.
    #[serde(other)]
    Unknown,
}

impl Frame {
    /// Returns the wire name of this frame's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::Authenticated => "authenticated",
            Self::Subscribe { .. } => "subscribe",
            Self::Subscribed { .. } => "subscribed",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Publish { .. } => "publish",
            Self::Message { .. } => "message",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Encodes the frame as JSON text.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::encode)
    }

    /// Decodes a frame from JSON text.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::decode)
    }
}

/// Builds a [`Message`] from the fields of an inbound `message` frame.
///
/// The type comes from `message_type`, else `data.type`, else
/// [`DEFAULT_MESSAGE_TYPE`]. When `data` carries both `type` and `data` the
/// inner `data` becomes the payload; otherwise `data` is delivered as is.
#[must_use]
pub fn unwrap_message(
    channel: Channel,
    message_type: Option<String>,
    data: Value,
    received_at: DateTime<Utc>,
) -> Message {
    let inner_type = data.get("type").and_then(Value::as_str).map(str::to_string);
    let wrapped = inner_type.is_some() && data.get("data").is_some();

    let kind = message_type
        .or(inner_type)
        .unwrap_or_else(|| DEFAULT_MESSAGE_TYPE.to_string());

    let payload = if wrapped {
        match data {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            other => other,
        }
    } else {
        data
    };

    Message::new(channel, kind, payload, received_at)
}
