//! Metrics collection and export.
//!
//! Counters and gauges describing connection health and message delivery,
//! exported in Prometheus format. Recording is a no-op until
//! [`init_metrics`] installs a recorder.

mod config;
mod recorder;

pub use config::MetricsConfig;
pub use recorder::TidingsMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder when `config.enabled` is set.
///
/// ```no_run
/// use tidings_telemetry::metrics::{init_metrics, MetricsConfig};
///
/// let config = MetricsConfig { enabled: true, ..MetricsConfig::default() };
/// init_metrics(&config).expect("metrics");
/// ```
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }
    if METRICS_HANDLE.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let builder = PrometheusBuilder::new();
    let handle = if config.expose_endpoint {
        let addr: SocketAddr = config
            .endpoint_address
            .parse()
            .map_err(|e| MetricsError::InvalidAddress(format!("{e}")))?;

        builder
            .with_http_listener(addr)
            .install_recorder()
            .map_err(|e| MetricsError::InitializationFailed(format!("{e}")))?
    } else {
        builder
            .install_recorder()
            .map_err(|e| MetricsError::InitializationFailed(format!("{e}")))?
    };

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    TidingsMetrics::register();

    Ok(())
}

/// Renders the current metrics in Prometheus text format.
///
/// Empty until [`init_metrics`] has installed a recorder.
#[must_use]
pub fn render_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Errors that can occur during metrics initialization.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Metrics already initialized
    #[error("Metrics system already initialized")]
    AlreadyInitialized,

    /// Invalid endpoint address
    #[error("Invalid endpoint address: {0}")]
    InvalidAddress(String),

    /// Initialization failed
    #[error("Metrics initialization failed: {0}")]
    InitializationFailed(String),
}
