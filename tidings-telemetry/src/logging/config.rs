//! Logging configuration types.

use serde::{Deserialize, Serialize};

/// Configuration for the logging system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive (e.g. "info", "tidings_client=debug").
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Output targets
    #[serde(default = "default_outputs")]
    pub outputs: Vec<LogOutput>,

    /// Include thread IDs in log output
    #[serde(default)]
    pub include_thread_id: bool,

    /// Include file and line information
    #[serde(default)]
    pub include_file_info: bool,

    /// Include span enter/exit events
    #[serde(default)]
    pub include_span_events: bool,

    /// Mask nonces, session ids and bearer tokens in every output
    #[serde(default = "default_mask_sensitive")]
    pub mask_sensitive: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            outputs: default_outputs(),
            include_thread_id: false,
            include_file_info: false,
            include_span_events: false,
            mask_sensitive: default_mask_sensitive(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_outputs() -> Vec<LogOutput> {
    vec![LogOutput::Stderr]
}

fn default_mask_sensitive() -> bool {
    true
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for log aggregation systems
    #[default]
    Json,
    /// Human-readable format for development
    Pretty,
}

/// Log output target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogOutput {
    /// Output to stderr, keeping stdout free for event output
    Stderr,
    /// Output to stdout
    Stdout,
    /// Output to rolling files
    File {
        /// Directory for log files
        path: String,
        /// File name prefix
        #[serde(default = "default_file_prefix")]
        prefix: String,
        /// Rotation policy
        #[serde(default)]
        rotation: RotationConfig,
    },
}

fn default_file_prefix() -> String {
    "tidings.log".to_string()
}

/// Log rotation configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationConfig {
    /// Rotate logs hourly
    Hourly,
    /// Rotate logs daily
    #[default]
    Daily,
    /// Never rotate (single file)
    Never,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.outputs, vec![LogOutput::Stderr]);
        assert!(config.mask_sensitive);
    }

    #[test]
    fn test_file_output_defaults() {
        let output: LogOutput =
            serde_json::from_str(r#"{"type":"file","path":"/var/log/tidings"}"#).unwrap();
        assert_eq!(
            output,
            LogOutput::File {
                path: "/var/log/tidings".to_string(),
                prefix: "tidings.log".to_string(),
                rotation: RotationConfig::Daily,
            }
        );
    }
}
