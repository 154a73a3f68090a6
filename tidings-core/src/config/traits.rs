//! Configuration traits for validation and environment overrides.

use crate::error::ConfigError;

/// Trait for configuration types that can be validated.
///
/// ```rust
/// use tidings_core::config::Validatable;
/// use tidings_core::error::ConfigError;
///
/// struct PollSettings {
///     interval_ms: u64,
/// }
///
/// impl Validatable for PollSettings {
///     fn validate(&self) -> Result<(), ConfigError> {
///         if self.interval_ms == 0 {
///             return Err(ConfigError::invalid_value("interval_ms", "must be positive"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validatable {
    /// Validates the configuration, returning the first problem found.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Trait for configuration types that accept environment variable overrides.
pub trait Configurable: Sized {
    /// Applies overrides from variables named `{prefix}_...`.
    fn apply_env_overrides(&mut self, prefix: &str);

    /// Lists the variable names consulted for the given prefix.
    fn env_var_names(prefix: &str) -> Vec<String>;
}
