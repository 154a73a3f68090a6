//! Poll REST API.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tidings_core::error::{ProtocolError, Result};
use tidings_core::types::{Channel, Message, Token};
use tracing::warn;

use crate::rest::RestClient;

/// Server calls the poll transport depends on.
#[async_trait]
pub trait PollApi: Send + Sync {
    /// Creates a session subscribed to `channels` and returns its id.
    async fn create_session(&self, token: &Token, channels: &[Channel]) -> Result<String>;

    /// Adds a channel to an existing session.
    async fn subscribe(&self, token: &Token, session_id: &str, channel: &Channel) -> Result<()>;

    /// Removes a channel from an existing session.
    async fn unsubscribe(&self, token: &Token, session_id: &str, channel: &Channel) -> Result<()>;

    /// Ends a session.
    async fn destroy_session(&self, token: &Token, session_id: &str) -> Result<()>;

    /// Publishes a message.
    async fn publish(
        &self,
        token: &Token,
        channel: &Channel,
        data: Value,
        kind: &str,
    ) -> Result<()>;

    /// Fetches messages received after `since`.
    async fn fetch(
        &self,
        token: &Token,
        session_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl Envelope {
    fn into_success(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(ProtocolError::ServerError {
                reason: self
                    .message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            }
            .into())
        }
    }

    /// Decodes each message on its own; entries that do not decode are
    /// logged and skipped so the rest of the batch still arrives.
    fn into_messages(self) -> Vec<Message> {
        self.messages
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Message>(raw) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable poll message");
                    None
                }
            })
            .collect()
    }
}

/// [`PollApi`] over the realtime REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpPollApi {
    rest: Arc<RestClient>,
}

impl HttpPollApi {
    /// Creates the API over a shared REST client.
    #[must_use]
    pub fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }

    async fn post(&self, path: &str, token: &Token, body: &Value) -> Result<Envelope> {
        let envelope: Envelope = self
            .rest
            .post(path)
            .token(token)
            .json(body)?
            .send_json()
            .await?;
        envelope.into_success()
    }
}

#[async_trait]
impl PollApi for HttpPollApi {
    async fn create_session(&self, token: &Token, channels: &[Channel]) -> Result<String> {
        let body = json!({ "channels": channels, "token": token.expose() });
        let envelope = self.post("/realtime/subscribe", token, &body).await?;
        envelope.session_id.ok_or_else(|| {
            ProtocolError::decode("subscribe response carried no session_id").into()
        })
    }

    async fn subscribe(&self, token: &Token, session_id: &str, channel: &Channel) -> Result<()> {
        let body = json!({ "channel": channel, "token": token.expose(), "session_id": session_id });
        self.post("/realtime/subscribe", token, &body).await.map(|_| ())
    }

    async fn unsubscribe(&self, token: &Token, session_id: &str, channel: &Channel) -> Result<()> {
        let body = json!({ "channel": channel, "token": token.expose(), "session_id": session_id });
        self.post("/realtime/unsubscribe", token, &body).await.map(|_| ())
    }

    async fn destroy_session(&self, token: &Token, session_id: &str) -> Result<()> {
        let body = json!({ "session_id": session_id, "token": token.expose() });
        self.post("/realtime/unsubscribe", token, &body).await.map(|_| ())
    }

    async fn publish(
        &self,
        token: &Token,
        channel: &Channel,
        data: Value,
        kind: &str,
    ) -> Result<()> {
        let body = json!({
            "channel": channel,
            "data": data,
            "type": kind,
            "token": token.expose(),
        });
        self.post("/realtime/publish", token, &body).await.map(|_| ())
    }

    async fn fetch(
        &self,
        token: &Token,
        session_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        let envelope: Envelope = self
            .rest
            .get("/realtime/messages")
            .query("session_id", session_id)
            .query("since", since.to_rfc3339_opts(SecondsFormat::Millis, true))
            .token(token)
            .send_json()
            .await?;
        Ok(envelope.into_success()?.into_messages())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_with_messages() {
        let envelope: Envelope = serde_json::from_str(
            r#"{
                "success": true,
                "messages": [
                    {"channel": "comments_post_7", "type": "new_comment",
                     "data": {"id": 3}, "received_at": "2026-01-05T10:00:00Z"}
                ]
            }"#,
        )
        .unwrap();
        let messages = envelope.into_success().unwrap().into_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel.as_str(), "comments_post_7");
        assert_eq!(messages[0].kind.as_str(), "new_comment");
    }

    #[test]
    fn test_malformed_message_is_skipped_not_the_batch() {
        let envelope: Envelope = serde_json::from_str(
            r#"{
                "success": true,
                "messages": [
                    {"channel": "comments_post_7", "type": "new_comment",
                     "data": {"id": 3}, "received_at": "2026-01-05T10:00:00Z"},
                    {"channel": "comments_post_7", "type": "new_comment",
                     "data": {"id": 4}, "received_at": "2026-01-05 10:00:01"},
                    {"channel": "comments_post_7", "data": {"id": 5},
                     "received_at": "2026-01-05T10:00:02Z"},
                    {"channel": "activity_feed_42", "type": "activity_update",
                     "data": {"actor": "sam"}, "received_at": "2026-01-05T10:00:03Z"}
                ]
            }"#,
        )
        .unwrap();
        let messages = envelope.into_success().unwrap().into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].data["id"], 3);
        assert_eq!(messages[1].channel.as_str(), "activity_feed_42");
    }

    #[test]
    fn test_unsuccessful_envelope_is_server_error() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"success": false, "message": "invalid session"}"#).unwrap();
        let err = envelope.into_success().unwrap_err();
        assert!(err.to_string().contains("invalid session"));
    }

    #[test]
    fn test_missing_success_is_failure() {
        let envelope: Envelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.into_success().is_err());
    }
}
