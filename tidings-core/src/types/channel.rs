//! Channel names and their routing namespaces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Pub/sub topic name.
///
/// The prefix of a channel determines which handler registry sees its
/// messages when the message type alone does not.
///
/// ```
/// use tidings_core::types::{Channel, MessageCategory};
///
/// let channel = Channel::comments_post(7);
/// assert_eq!(channel.as_str(), "comments_post_7");
/// assert_eq!(channel.category(), Some(MessageCategory::Comments));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Channel(String);

impl Channel {
    /// Creates a channel, rejecting empty names and names with whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() {
            return Err(ValidationError::EmptyChannel);
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::InvalidChannel(s));
        }
        Ok(Self(s))
    }

    /// Creates a channel without validation.
    #[must_use]
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Comment stream for a post.
    #[must_use]
    pub fn comments_post(post_id: impl fmt::Display) -> Self {
        Self(format!("{}{post_id}", MessageCategory::Comments.channel_prefix()))
    }

    /// Collaborative editing session.
    #[must_use]
    pub fn collaboration_session(session_id: impl fmt::Display) -> Self {
        Self(format!(
            "{}{session_id}",
            MessageCategory::Collaboration.channel_prefix()
        ))
    }

    /// Activity feed for a user or team.
    #[must_use]
    pub fn activity_feed(feed_id: impl fmt::Display) -> Self {
        Self(format!("{}{feed_id}", MessageCategory::Activity.channel_prefix()))
    }

    /// Returns the channel as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the routing category implied by the channel prefix.
    #[must_use]
    pub fn category(&self) -> Option<MessageCategory> {
        MessageCategory::ALL
            .into_iter()
            .find(|category| self.0.starts_with(category.channel_prefix()))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Channel {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

/// Routing category of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    /// Post comments and replies.
    Comments,
    /// Collaborative editing: content, presence, conflicts, approvals.
    Collaboration,
    /// Activity feed entries.
    Activity,
}

impl MessageCategory {
    /// Every category, in routing-table order.
    pub const ALL: [Self; 3] = [Self::Comments, Self::Collaboration, Self::Activity];

    /// Channel name prefix owned by this category.
    #[must_use]
    pub const fn channel_prefix(&self) -> &'static str {
        match self {
            Self::Comments => "comments_post_",
            Self::Collaboration => "collaboration_session_",
            Self::Activity => "activity_feed_",
        }
    }

    /// Returns the category name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Comments => "comments",
            Self::Collaboration => "collaboration",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
