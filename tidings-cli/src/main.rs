//! # Tidings CLI
//!
//! Command-line front end for the realtime client.
//!
//! This CLI provides commands for:
//! - Watching channels and printing UI events as JSON lines
//! - Publishing a message to a channel
//! - Socket endpoint discovery
//! - Inspecting the effective configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use tidings_client::ClientConfig;
use tidings_core::config::ConfigLoader;
use tidings_telemetry::logging::init_logging;
use tidings_telemetry::metrics::init_metrics;
use tracing::debug;

use commands::{config, discover, publish, watch};

/// Prefix for environment overrides, e.g. `TIDINGS_REST_BASE_URL`.
pub const ENV_PREFIX: &str = "TIDINGS";

/// Tidings - real-time delivery client
#[derive(Parser)]
#[command(name = "tidings")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (YAML, TOML or JSON)
    #[arg(short, long, global = true, default_value = "tidings.yaml")]
    config: String,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Connect, subscribe and print UI events until interrupted
    Watch(watch::WatchArgs),

    /// Publish one message
    Publish(publish::PublishArgs),

    /// Print the socket endpoint the server advertises
    Discover(discover::DiscoverArgs),

    /// Validate and print the effective configuration
    Config(config::ConfigArgs),

    /// Show client information
    Info,
}

/// Loads the configuration file, or defaults when it does not exist.
///
/// Environment overrides and validation apply either way.
fn load_config(path: &str) -> Result<ClientConfig> {
    let loader = ConfigLoader::new().with_env_prefix(ENV_PREFIX);
    let config = if Path::new(path).exists() {
        loader
            .load_file(path)
            .with_context(|| format!("Failed to load configuration from {path}"))?
    } else {
        debug!(path, "Configuration file not found, using defaults");
        loader
            .load_defaults()
            .context("Invalid default configuration")?
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Info = cli.command {
        print_info();
        return Ok(());
    }

    let mut client_config = load_config(&cli.config)?;
    if cli.verbose {
        client_config.logging.level = "debug".to_string();
    }
    let _guards = init_logging(&client_config.logging).context("Failed to initialize logging")?;
    init_metrics(&client_config.metrics).context("Failed to initialize metrics")?;

    match cli.command {
        Commands::Watch(args) => watch::run(&client_config, args).await?,
        Commands::Publish(args) => publish::run(&client_config, args).await?,
        Commands::Discover(args) => discover::run(&client_config, args).await?,
        Commands::Config(args) => config::run(&client_config, &args)?,
        Commands::Info => {}
    }

    Ok(())
}

fn print_info() {
    use tidings_core::config::Configurable;

    println!("Tidings Realtime Client");
    println!("=======================");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Rust Edition: 2024");
    println!();
    println!("Transports:");
    println!("  - WebSocket (authenticate handshake, heartbeat)");
    println!("  - HTTP long-poll (session based, exponential backoff)");
    println!();
    println!("Channel families:");
    println!("  - comments_post_<id>");
    println!("  - collaboration_session_<id>");
    println!("  - activity_feed_<id>");
    println!();
    println!("Environment overrides:");
    for name in ClientConfig::env_var_names(ENV_PREFIX) {
        println!("  - {name}");
    }
}
