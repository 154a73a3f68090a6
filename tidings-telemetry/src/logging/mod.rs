//! Structured logging.
//!
//! - JSON and pretty formats
//! - stdout, stderr and rolling file outputs
//! - masking of nonces, session ids and bearer tokens before output

mod config;
mod writer;

pub use config::{LogConfig, LogFormat, LogOutput, RotationConfig};
pub use writer::{MaskingMakeWriter, MaskingWriter};

use crate::masking::SensitiveDataMasker;
use std::sync::Arc;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, MakeWriter, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Initializes the global subscriber.
///
/// Returns the file writer guards; keep them alive for the lifetime of the
/// program so buffered lines are flushed.
///
/// ```no_run
/// use tidings_telemetry::logging::{init_logging, LogConfig};
///
/// let _guards = init_logging(&LogConfig::default()).expect("logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Vec<WorkerGuard>, LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LoggingError::InvalidConfig(format!("level '{}': {e}", config.level)))?;

    let masker = Arc::new(SensitiveDataMasker::new());
    let mut guards = Vec::new();
    let mut layers = Vec::new();

    for output in &config.outputs {
        match output {
            LogOutput::Stderr => {
                layers.push(masked_layer(config, std::io::stderr, &masker, true));
            }
            LogOutput::Stdout => {
                layers.push(masked_layer(config, std::io::stdout, &masker, true));
            }
            LogOutput::File {
                path,
                prefix,
                rotation,
            } => {
                std::fs::create_dir_all(path)?;
                let appender = match rotation {
                    RotationConfig::Hourly => tracing_appender::rolling::hourly(path, prefix),
                    RotationConfig::Daily => tracing_appender::rolling::daily(path, prefix),
                    RotationConfig::Never => tracing_appender::rolling::never(path, prefix),
                };
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                layers.push(masked_layer(config, non_blocking, &masker, false));
                guards.push(guard);
            }
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(guards)
}

fn masked_layer<S, W>(
    config: &LogConfig,
    writer: W,
    masker: &Arc<SensitiveDataMasker>,
    ansi: bool,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if config.mask_sensitive {
        fmt_layer(
            config,
            MaskingMakeWriter::new(writer, Arc::clone(masker)),
            ansi,
        )
    } else {
        fmt_layer(config, writer, ansi)
    }
}

fn fmt_layer<S, W>(config: &LogConfig, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(config.include_thread_id)
        .with_file(config.include_file_info)
        .with_line_number(config.include_file_info)
        .with_span_events(if config.include_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    match config.format {
        LogFormat::Json => base.json().flatten_event(true).boxed(),
        LogFormat::Pretty => base.with_ansi(ansi).pretty().boxed(),
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create the log directory
    #[error("Failed to create log directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid logging configuration: {0}")]
    InvalidConfig(String),

    /// A global subscriber is already installed
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}
