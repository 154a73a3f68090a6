//! Server-side poll session.

use chrono::{DateTime, Utc};
use tidings_core::types::Message;

/// A server-side poll session and its `since` cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSession {
    /// Server-assigned identifier.
    pub session_id: String,
    /// Messages at or before this instant have been delivered.
    pub since: DateTime<Utc>,
}

impl PollSession {
    /// Creates a session whose cursor starts at `created_at`.
    #[must_use]
    pub fn new(session_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            since: created_at,
        }
    }

    /// Moves the cursor to the latest `received_at` in `messages`.
    ///
    /// The cursor never moves backwards.
    pub fn advance(&mut self, messages: &[Message]) {
        if let Some(latest) = messages.iter().map(|m| m.received_at).max()
            && latest > self.since
        {
            self.since = latest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::Value;
    use tidings_core::types::Channel;

    fn message_at(at: DateTime<Utc>) -> Message {
        Message::new(Channel::activity_feed("site"), "activity_update", Value::Null, at)
    }

    #[test]
    fn test_cursor_moves_to_latest() {
        let start = Utc::now();
        let mut session = PollSession::new("s-1", start);
        let later = start + Duration::seconds(5);
        let latest = start + Duration::seconds(9);

        session.advance(&[message_at(later), message_at(latest)]);
        assert_eq!(session.since, latest);
    }

    #[test]
    fn test_cursor_never_moves_back() {
        let start = Utc::now();
        let mut session = PollSession::new("s-1", start);
        session.advance(&[message_at(start - Duration::seconds(30))]);
        assert_eq!(session.since, start);

        session.advance(&[]);
        assert_eq!(session.since, start);
    }
}
