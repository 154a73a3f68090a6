//! Publish command.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tidings_client::{ClientConfig, RealtimeClient};
use tidings_core::types::{Channel, Token};
use tracing::info;

use super::{parse_channel, parse_token};

/// Arguments for the publish command
#[derive(Parser)]
pub struct PublishArgs {
    /// Target channel, e.g. `comments_post_7`
    #[arg(short = 'C', long, value_parser = parse_channel)]
    pub channel: Channel,

    /// JSON payload
    #[arg(short, long)]
    pub data: String,

    /// Message type, e.g. `new_comment`
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Token to authenticate with; otherwise the configured sources are used
    #[arg(short, long, env = "TIDINGS_TOKEN", hide_env_values = true, value_parser = parse_token)]
    pub token: Option<Token>,
}

/// Connects, publishes one message and disconnects.
///
/// # Errors
///
/// Returns error if the payload is not JSON, no transport connects, or the
/// publish is rejected.
pub async fn run(config: &ClientConfig, args: PublishArgs) -> Result<()> {
    let data: Value = serde_json::from_str(&args.data).context("Payload is not valid JSON")?;

    let client = RealtimeClient::from_config(config).context("Failed to build client")?;
    if !client.connect(args.token).await {
        client.disconnect().await;
        anyhow::bail!("Could not connect to the realtime service");
    }

    let result = client
        .publish(&args.channel, data, args.kind.as_deref())
        .await
        .with_context(|| format!("Failed to publish to {}", args.channel));
    client.disconnect().await;
    result?;

    info!(channel = %args.channel, "Published");
    Ok(())
}
