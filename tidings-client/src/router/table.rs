//! Routing table: message type first, then channel prefix.

use std::collections::HashMap;
use tidings_core::types::{Message, MessageCategory, MessageKind};

/// How a message matched its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    /// Exact message type.
    Kind,
    /// Channel name prefix.
    Prefix,
}

/// Routing decision for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Category whose handlers run.
    pub category: MessageCategory,
    /// UI event name to emit.
    pub event: MessageKind,
    /// Which rule matched.
    pub matched_by: MatchedBy,
}

/// Explicit type and prefix tables.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    by_kind: HashMap<MessageKind, MessageCategory>,
    by_prefix: Vec<(String, MessageCategory)>,
}

impl RoutingTable {
    /// Table with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_kind: HashMap::new(),
            by_prefix: Vec::new(),
        }
    }

    /// Routes `kind` to `category`, replacing any earlier entry.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<MessageKind>, category: MessageCategory) -> Self {
        self.by_kind.insert(kind.into(), category);
        self
    }

    /// Routes channels starting with `prefix` to `category`.
    ///
    /// Prefixes are tried in insertion order.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>, category: MessageCategory) -> Self {
        self.by_prefix.push((prefix.into(), category));
        self
    }

    /// Classifies a message, or `None` when neither table matches.
    #[must_use]
    pub fn classify(&self, message: &Message) -> Option<Route> {
        if let Some(&category) = self.by_kind.get(&message.kind) {
            return Some(Route {
                category,
                event: message.kind.clone(),
                matched_by: MatchedBy::Kind,
            });
        }

        let channel = message.channel.as_str();
        self.by_prefix
            .iter()
            .find(|(prefix, _)| channel.starts_with(prefix.as_str()))
            .map(|&(_, category)| Route {
                category,
                event: MessageKind::default_for(category),
                matched_by: MatchedBy::Prefix,
            })
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        let table = MessageKind::KNOWN.into_iter().fold(Self::empty(), |table, kind| {
            match kind.category() {
                Some(category) => table.with_kind(kind, category),
                None => table,
            }
        });
        MessageCategory::ALL
            .into_iter()
            .fold(table, |table, category| {
                table.with_prefix(category.channel_prefix(), category)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tidings_core::types::Channel;

    fn message(channel: Channel, kind: &str) -> Message {
        Message::new(channel, kind, json!({}), Utc::now())
    }

    #[test]
    fn test_type_wins_over_prefix() {
        let table = RoutingTable::default();
        let route = table
            .classify(&message(Channel::activity_feed(1), "comment_reply"))
            .unwrap();
        assert_eq!(route.category, MessageCategory::Comments);
        assert_eq!(route.event, MessageKind::CommentReply);
        assert_eq!(route.matched_by, MatchedBy::Kind);
    }

    #[test]
    fn test_collaboration_kinds() {
        let table = RoutingTable::default();
        for kind in [
            "content_update",
            "session_update",
            "conflict_detected",
            "approval_update",
        ] {
            let route = table
                .classify(&message(Channel::comments_post(1), kind))
                .unwrap();
            assert_eq!(route.category, MessageCategory::Collaboration, "{kind}");
        }
    }

    #[test]
    fn test_prefix_fallback_uses_default_event() {
        let table = RoutingTable::default();
        let route = table
            .classify(&message(Channel::activity_feed(42), "message"))
            .unwrap();
        assert_eq!(route.category, MessageCategory::Activity);
        assert_eq!(route.event, MessageKind::ActivityUpdate);
        assert_eq!(route.matched_by, MatchedBy::Prefix);

        let route = table
            .classify(&message(Channel::collaboration_session("abc"), "cursor"))
            .unwrap();
        assert_eq!(route.event, MessageKind::ContentUpdate);
    }

    #[test]
    fn test_unroutable() {
        let table = RoutingTable::default();
        let unknown = message(Channel::new("presence_global").unwrap(), "hello");
        assert!(table.classify(&unknown).is_none());
    }

    #[test]
    fn test_custom_kind() {
        let table = RoutingTable::default().with_kind("reaction_added", MessageCategory::Comments);
        let route = table
            .classify(&message(Channel::new("reactions").unwrap(), "reaction_added"))
            .unwrap();
        assert_eq!(route.category, MessageCategory::Comments);
        assert_eq!(route.event.as_str(), "reaction_added");
    }
}
