//! Transport abstraction.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tidings_core::error::{Result, TidingsError};
use tidings_core::types::{Channel, Message, Token, TransportMethod};
use tokio::sync::mpsc;

/// Event emitted by a connected transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An inbound message, already unwrapped from transport framing.
    Message(Message),
    /// The transport stopped working. Sent at most once per connection and
    /// never after an intentional `disconnect()`.
    Failed(TidingsError),
}

/// Channel on which a transport reports events to its owner.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// A way of carrying realtime traffic.
///
/// Implementations use interior mutability so the owner can keep an
/// `Arc<dyn Transport>` and tear it down while other calls are pending.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which transport this is.
    fn method(&self) -> TransportMethod;

    /// Brings the transport to ready and subscribes `channels` in order.
    ///
    /// Resolves only after the handshake (socket) or session creation (poll)
    /// succeeded, or with the error that abandoned the attempt.
    async fn connect(&self, token: &Token, channels: &[Channel], events: EventSender) -> Result<()>;

    /// Tears the transport down. Late results are discarded.
    async fn disconnect(&self);

    /// Subscribes a channel.
    async fn subscribe(&self, channel: &Channel) -> Result<()>;

    /// Unsubscribes a channel.
    async fn unsubscribe(&self, channel: &Channel) -> Result<()>;

    /// Publishes `data` on `channel` with an optional message type.
    async fn publish(&self, channel: &Channel, data: Value, kind: Option<&str>) -> Result<()>;

    /// Returns true once `connect` succeeded and until the transport fails or
    /// is disconnected.
    fn is_ready(&self) -> bool;
}

/// Supplies a fresh token when the server rejects the current one.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Drops any cached token and returns a newly obtained one.
    async fn refresh_token(&self) -> Option<Token>;
}

/// Builds transports on demand.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Creates a fresh, unconnected transport of the given kind.
    ///
    /// Returns `TransportError::Unavailable` when the method cannot be used,
    /// e.g. when discovery reports no socket endpoint.
    async fn create(&self, method: TransportMethod, token: &Token) -> Result<Arc<dyn Transport>>;
}
