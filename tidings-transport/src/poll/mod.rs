//! HTTP long-poll transport.
//!
//! Used when the socket is unavailable. Holds a server session, fetches
//! messages newer than its cursor and backs off exponentially on failure.

mod api;
mod backoff;
mod client;
mod config;
mod session;

pub use api::{HttpPollApi, PollApi};
pub use backoff::PollBackoff;
pub use client::PollTransport;
pub use config::PollConfig;
pub use session::PollSession;
