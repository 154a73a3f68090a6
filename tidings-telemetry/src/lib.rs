//! # Tidings Telemetry
//!
//! Logging, tracing and metrics for the tidings real-time client.
//!
//! - **Structured Logging**: `tracing` with JSON or pretty output to stdout and rolling files
//! - **Data Masking**: nonces, session ids and bearer tokens are masked before output
//! - **Spans**: connection, transport, poll and routing spans
//! - **Metrics**: Prometheus-compatible counters for connection health and delivery

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

/// Logging configuration and initialization
pub mod logging;

/// Sensitive data masking
pub mod masking;

/// Span definitions
pub mod spans;

/// Metrics collection and export
pub mod metrics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::logging::{LogConfig, LogFormat, LogOutput, init_logging};
    pub use crate::masking::{Sensitive, SensitiveDataMasker};
    pub use crate::metrics::{MetricsConfig, TidingsMetrics, init_metrics};
    pub use crate::spans::*;
}
