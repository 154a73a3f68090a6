//! Inbound realtime messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::{Channel, MessageCategory};

/// Domain type of a message.
///
/// Unknown types are kept verbatim so that channel-prefix routing can still
/// deliver them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    /// A new comment on a post.
    NewComment,
    /// A reply to an existing comment.
    CommentReply,
    /// Collaborative document content changed.
    ContentUpdate,
    /// Collaboration session membership or presence changed.
    SessionUpdate,
    /// Concurrent edits conflicted.
    ConflictDetected,
    /// Approval workflow state changed.
    ApprovalUpdate,
    /// New activity feed entry.
    ActivityUpdate,
    /// Any other type string.
    Other(String),
}

impl MessageKind {
    /// Every known domain kind.
    pub const KNOWN: [Self; 7] = [
        Self::NewComment,
        Self::CommentReply,
        Self::ContentUpdate,
        Self::SessionUpdate,
        Self::ConflictDetected,
        Self::ApprovalUpdate,
        Self::ActivityUpdate,
    ];

    /// Parses a wire type string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .unwrap_or_else(|| Self::Other(value.to_string()))
    }

    /// Returns the wire type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NewComment => "new_comment",
            Self::CommentReply => "comment_reply",
            Self::ContentUpdate => "content_update",
            Self::SessionUpdate => "session_update",
            Self::ConflictDetected => "conflict_detected",
            Self::ApprovalUpdate => "approval_update",
            Self::ActivityUpdate => "activity_update",
            Self::Other(other) => other,
        }
    }

    /// Category this kind routes to, independent of the channel.
    #[must_use]
    pub fn category(&self) -> Option<MessageCategory> {
        match self {
            Self::NewComment | Self::CommentReply => Some(MessageCategory::Comments),
            Self::ContentUpdate
            | Self::SessionUpdate
            | Self::ConflictDetected
            | Self::ApprovalUpdate => Some(MessageCategory::Collaboration),
            Self::ActivityUpdate => Some(MessageCategory::Activity),
            Self::Other(_) => None,
        }
    }

    /// Kind assumed when only the channel prefix identifies the category.
    #[must_use]
    pub fn default_for(category: MessageCategory) -> Self {
        match category {
            MessageCategory::Comments => Self::NewComment,
            MessageCategory::Collaboration => Self::ContentUpdate,
            MessageCategory::Activity => Self::ActivityUpdate,
        }
    }
}

impl From<String> for MessageKind {
    fn from(value: String) -> Self {
        match Self::parse(&value) {
            Self::Other(_) => Self::Other(value),
            known => known,
        }
    }
}

impl From<&str> for MessageKind {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message delivered by a transport.
///
/// Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Channel the message was published on.
    pub channel: Channel,
    /// Domain message type.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Raw payload.
    #[serde(default)]
    pub data: Value,
    /// Receipt time; the poll cursor advances to the latest of these.
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub fn new(
        channel: Channel,
        kind: impl Into<MessageKind>,
        data: Value,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            channel,
            kind: kind.into(),
            data,
            received_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_parse_known_and_other() {
        assert_eq!(MessageKind::parse("new_comment"), MessageKind::NewComment);
        assert_eq!(
            MessageKind::parse("approval_update"),
            MessageKind::ApprovalUpdate
        );
        assert_eq!(
            MessageKind::parse("typing"),
            MessageKind::Other("typing".to_string())
        );
    }

    #[test]
    fn test_kind_categories() {
        assert_eq!(
            MessageKind::CommentReply.category(),
            Some(MessageCategory::Comments)
        );
        assert_eq!(
            MessageKind::ConflictDetected.category(),
            Some(MessageCategory::Collaboration)
        );
        assert_eq!(
            MessageKind::ActivityUpdate.category(),
            Some(MessageCategory::Activity)
        );
        assert_eq!(MessageKind::Other("x".to_string()).category(), None);
    }

    #[test]
    fn test_default_kind_per_category() {
        assert_eq!(
            MessageKind::default_for(MessageCategory::Comments),
            MessageKind::NewComment
        );
        assert_eq!(
            MessageKind::default_for(MessageCategory::Collaboration),
            MessageKind::ContentUpdate
        );
        assert_eq!(
            MessageKind::default_for(MessageCategory::Activity),
            MessageKind::ActivityUpdate
        );
    }

    #[test]
    fn test_message_from_poll_payload() {
        let payload = json!({
            "channel": "comments_post_7",
            "type": "new_comment",
            "data": {"id": 1, "body": "hi"},
            "received_at": "2024-05-01T12:00:00Z"
        });
        let message: Message = serde_json::from_value(payload).unwrap();
        assert_eq!(message.channel.as_str(), "comments_post_7");
        assert_eq!(message.kind, MessageKind::NewComment);
        assert_eq!(message.data["id"], 1);
        assert_eq!(message.received_at.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_message_serializes_type_field() {
        let message = Message::new(
            Channel::activity_feed(42),
            "activity_update",
            json!({"n": 1}),
            Utc::now(),
        );
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "activity_update");
        assert_eq!(value["channel"], "activity_feed_42");
    }
}
