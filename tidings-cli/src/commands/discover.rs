//! Discover command.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tidings_client::ClientConfig;
use tidings_core::clock::SystemClock;
use tidings_core::types::Token;
use tidings_transport::rest::{HttpSocketDiscovery, RestClient, SocketDiscovery};

use super::parse_token;

/// Arguments for the discover command
#[derive(Parser)]
pub struct DiscoverArgs {
    /// Token sent with the discovery request
    #[arg(short, long, env = "TIDINGS_TOKEN", hide_env_values = true, value_parser = parse_token)]
    pub token: Option<Token>,
}

/// Prints the advertised socket URL, or a note that only polling is offered.
///
/// # Errors
///
/// Returns error if the REST client cannot be built.
pub async fn run(config: &ClientConfig, args: DiscoverArgs) -> Result<()> {
    let rest = Arc::new(RestClient::new(config.rest.clone()).context("Failed to build REST client")?);
    let discovery = HttpSocketDiscovery::new(rest, SystemClock::shared());

    match discovery.socket_url(args.token.as_ref()).await {
        Some(url) => println!("{url}"),
        None => println!("No socket endpoint advertised; the client will use long-polling"),
    }
    Ok(())
}
