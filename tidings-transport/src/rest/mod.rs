//! REST client and socket discovery.

mod client;
mod config;
mod discovery;

pub use client::{RequestBuilder, RestClient};
pub use config::RestConfig;
pub use discovery::{HttpSocketDiscovery, SocketDiscovery, parse_socket_url};
