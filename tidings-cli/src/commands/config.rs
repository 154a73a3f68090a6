//! Config command.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tidings_client::ClientConfig;
use tidings_core::config::{ConfigFormat, ConfigLoader};

/// Output format for the effective configuration
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML
    Yaml,
    /// TOML
    Toml,
    /// JSON
    Json,
}

impl From<OutputFormat> for ConfigFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => Self::Yaml,
            OutputFormat::Toml => Self::Toml,
            OutputFormat::Json => Self::Json,
        }
    }
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,
}

/// Prints the configuration after file loading, env overrides and validation.
///
/// Tokens are never serialized.
///
/// # Errors
///
/// Returns error if serialization fails.
pub fn run(config: &ClientConfig, args: &ConfigArgs) -> Result<()> {
    let rendered = ConfigLoader::serialize(config, args.format.into())
        .context("Failed to serialize configuration")?;
    println!("{rendered}");
    Ok(())
}
