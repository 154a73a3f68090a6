//! CLI command implementations.

pub mod config;
pub mod discover;
pub mod publish;
pub mod watch;

use tidings_core::types::{Channel, Token};

/// Parses a channel argument such as `comments_post_7`.
pub fn parse_channel(value: &str) -> Result<Channel, String> {
    Channel::new(value).map_err(|e| e.to_string())
}

/// Parses a token argument, applying the same shape check as the client.
pub fn parse_token(value: &str) -> Result<Token, String> {
    Token::new(value).map_err(|e| e.to_string())
}
