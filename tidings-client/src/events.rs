//! UI events and the broadcast bus that carries them.

use serde_json::{Value, json};
use tidings_core::types::{Channel, MessageCategory, MessageKind, TransportMethod};
use tokio::sync::broadcast;
use tracing::trace;

/// Event delivered to UI consumers.
///
/// Transport errors never appear here directly; they surface only as
/// [`UiEvent::RealtimeDisabled`] once the supervisor gives up.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// A routed domain message. `name` is the message type, or the
    /// category's default type when only the channel prefix matched.
    Update {
        /// Event name.
        name: MessageKind,
        /// Category that handled the message.
        category: MessageCategory,
        /// Source channel.
        channel: Channel,
        /// Raw message payload.
        data: Value,
    },
    /// Realtime delivery was switched off.
    RealtimeDisabled {
        /// Why the supervisor gave up.
        reason: String,
        /// Consecutive failures at that point.
        failure_count: u32,
    },
    /// A transport reached ready.
    RealtimeEnabled {
        /// Transport now carrying traffic.
        method: TransportMethod,
    },
}

impl UiEvent {
    /// Event name as seen by UI code.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Update { name, .. } => name.as_str(),
            Self::RealtimeDisabled { .. } => "realtime_disabled",
            Self::RealtimeEnabled { .. } => "realtime_enabled",
        }
    }

    /// JSON form: `{"event": <name>, ...}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Update {
                name,
                category,
                channel,
                data,
            } => json!({
                "event": name.as_str(),
                "category": category.as_str(),
                "channel": channel,
                "data": data,
            }),
            Self::RealtimeDisabled {
                reason,
                failure_count,
            } => json!({
                "event": self.name(),
                "reason": reason,
                "failure_count": failure_count,
            }),
            Self::RealtimeEnabled { method } => json!({
                "event": self.name(),
                "method": method.as_str(),
            }),
        }
    }
}

/// Typed event bus over `tokio::sync::broadcast`.
///
/// Emitting never blocks and never fails; with no subscribers the event is
/// dropped. Slow subscribers see `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<UiEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event; returns how many subscribers received it.
    pub fn emit(&self, event: UiEvent) -> usize {
        trace!(event = event.name(), "UI event");
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribes to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let update = UiEvent::Update {
            name: MessageKind::CommentReply,
            category: MessageCategory::Comments,
            channel: Channel::comments_post(7),
            data: json!({}),
        };
        assert_eq!(update.name(), "comment_reply");
        assert_eq!(
            UiEvent::RealtimeEnabled {
                method: TransportMethod::Poll
            }
            .name(),
            "realtime_enabled"
        );
    }

    #[test]
    fn test_to_json() {
        let event = UiEvent::RealtimeDisabled {
            reason: "reconnect budget exhausted".to_string(),
            failure_count: 6,
        };
        assert_eq!(
            event.to_json(),
            json!({
                "event": "realtime_disabled",
                "reason": "reconnect budget exhausted",
                "failure_count": 6
            })
        );
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        let delivered = bus.emit(UiEvent::RealtimeEnabled {
            method: TransportMethod::Socket,
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = EventBus::new(4);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(UiEvent::RealtimeEnabled {
            method: TransportMethod::Socket,
        });
        assert_eq!(first.recv().await.unwrap().name(), "realtime_enabled");
        assert_eq!(second.recv().await.unwrap().name(), "realtime_enabled");
    }
}
