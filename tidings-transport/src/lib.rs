//! # Tidings Transport
//!
//! The two ways the realtime client reaches the server.
//!
//! - `ws` - persistent WebSocket transport: authenticate handshake, heartbeat,
//!   FIFO queue for operations issued before the socket is ready
//! - `poll` - HTTP long-poll transport: server session, `since` cursor,
//!   local exponential backoff, session re-creation on 401/403
//! - `rest` - REST client for the realtime endpoints and socket URL discovery
//!
//! Both transports implement [`Transport`]; neither reconnects on its own.
//! Failures are reported once through [`TransportEvent::Failed`] and the
//! supervisor decides what happens next.
//!
//! ```ignore
//! use tidings_transport::prelude::*;
//!
//! let socket = SocketTransport::new(SocketConfig::builder().url("wss://rt.example.com").build());
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! socket.connect(&token, &channels, tx).await?;
//! while let Some(event) = rx.recv().await { /* ... */ }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Transport abstraction shared by socket and poll
pub mod transport;

/// WebSocket transport
pub mod ws;

/// REST client and socket discovery
pub mod rest;

/// Long-poll transport
pub mod poll;

/// Default transport factory
pub mod factory;

pub use transport::{EventSender, TokenRefresher, Transport, TransportEvent, TransportFactory};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::factory::HttpTransportFactory;
    pub use crate::poll::{HttpPollApi, PollApi, PollConfig, PollTransport};
    pub use crate::rest::{HttpSocketDiscovery, RestClient, RestConfig, SocketDiscovery};
    pub use crate::transport::{
        EventSender, TokenRefresher, Transport, TransportEvent, TransportFactory,
    };
    pub use crate::ws::{SocketConfig, SocketConfigBuilder, SocketState, SocketTransport};
}
