//! Persistent WebSocket transport.
//!
//! - Authenticates with the first frame and waits for `authenticated`
//! - Keeps the connection alive with application-level `ping` frames
//! - Queues subscribe, unsubscribe and publish until the socket is ready

mod client;
mod config;
mod frame;
mod state;

pub use client::SocketTransport;
pub use config::{SocketConfig, SocketConfigBuilder};
pub use frame::{DEFAULT_MESSAGE_TYPE, Frame, unwrap_message};
pub use state::SocketState;
