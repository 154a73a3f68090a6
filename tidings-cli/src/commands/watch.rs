//! Watch command.
//!
//! Connects, subscribes to the given channels and prints every UI event as a
//! JSON line on stdout until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use tidings_client::{ClientConfig, RealtimeClient};
use tidings_core::types::{Channel, Token};
use tidings_telemetry::metrics::render_metrics;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::{parse_channel, parse_token};

/// Arguments for the watch command
#[derive(Parser)]
pub struct WatchArgs {
    /// Channel to subscribe to (repeatable), e.g. `activity_feed_42`
    #[arg(short = 'C', long = "channel", required = true, value_parser = parse_channel)]
    pub channels: Vec<Channel>,

    /// Token to authenticate with; otherwise the configured sources are used
    #[arg(short, long, env = "TIDINGS_TOKEN", hide_env_values = true, value_parser = parse_token)]
    pub token: Option<Token>,

    /// Print the connection status as JSON on exit
    #[arg(long)]
    pub status: bool,

    /// Print Prometheus metrics on exit (requires `metrics.enabled`)
    #[arg(long)]
    pub metrics: bool,
}

/// Runs the watch loop.
///
/// # Errors
///
/// Returns error if the client cannot be built or a subscription fails.
pub async fn run(config: &ClientConfig, args: WatchArgs) -> Result<()> {
    let client = RealtimeClient::from_config(config).context("Failed to build client")?;
    let mut events = client.events();

    for channel in args.channels {
        client
            .subscribe(channel.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {channel}"))?;
    }

    if !client.connect(args.token).await {
        warn!("Not connected yet; retries continue in the background");
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", event.to_json()),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Output fell behind, events dropped"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if args.status {
        println!("{}", serde_json::to_string(&client.status())?);
    }
    if args.metrics {
        print!("{}", render_metrics());
    }
    client.disconnect().await;
    Ok(())
}
