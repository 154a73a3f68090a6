//! # Tidings Client
//!
//! The realtime client that applications talk to.
//!
//! - `supervisor` - [`RealtimeClient`]: transport selection, resubscription,
//!   reconnect with linear backoff, socket to poll fallback
//! - `circuit_breaker` - stops connection attempts after repeated failures
//! - `credential` - short-lived token lookup with caching and fallback sources
//! - `router` - per-category handler registries and UI event emission
//! - `events` - UI event bus
//! - `config` - file and environment configuration for the whole client
//!
//! ```ignore
//! use tidings_client::prelude::*;
//!
//! let client = RealtimeClient::from_config(&config)?;
//! client.router().on(MessageCategory::Comments, |message: &Message| {
//!     println!("{}", message.data);
//!     Ok(())
//! });
//! client.subscribe(Channel::comments_post(7)).await?;
//! client.connect(None).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Client configuration
pub mod config;

/// Circuit breaker guarding connection attempts
pub mod circuit_breaker;

/// Reconnect delay policy
pub mod reconnect;

/// Ordered channel set
pub mod channels;

/// UI events
pub mod events;

/// Message routing
pub mod router;

/// Credential provider
pub mod credential;

/// Connection supervisor
pub mod supervisor;

pub use config::ClientConfig;
pub use supervisor::{ClientStatus, RealtimeClient, RealtimeClientBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
    pub use crate::config::{ClientConfig, CredentialConfig, SupervisorConfig};
    pub use crate::credential::{CredentialProvider, TokenSource};
    pub use crate::events::{EventBus, UiEvent};
    pub use crate::router::{HandlerError, HandlerId, MessageHandler, MessageRouter};
    pub use crate::supervisor::{ClientStatus, RealtimeClient, RealtimeClientBuilder};
    pub use tidings_core::types::{Channel, Message, MessageCategory, MessageKind, Token};
}
