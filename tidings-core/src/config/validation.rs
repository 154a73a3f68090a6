//! Configuration validation utilities.

use crate::error::ConfigError;
use std::fmt::Display;

/// Result type for validation operations.
pub type ValidationResult = Result<(), ConfigError>;

/// Tracks the current section path and collects every validation error.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    path: Vec<String>,
    errors: Vec<ConfigError>,
}

impl ValidationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a configuration section.
    pub fn enter(&mut self, section: impl Into<String>) {
        self.path.push(section.into());
    }

    /// Leaves the current section.
    pub fn exit(&mut self) {
        self.path.pop();
    }

    /// Current path, dot separated (e.g. `supervisor.reconnect`).
    #[must_use]
    pub fn current_path(&self) -> String {
        self.path.join(".")
    }

    /// Records an error.
    pub fn add_error(&mut self, error: ConfigError) {
        self.errors.push(error);
    }

    /// Returns true if no errors were recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All recorded errors.
    #[must_use]
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    /// Consumes the context and returns the first error, if any.
    pub fn into_result(self) -> ValidationResult {
        self.errors.into_iter().next().map_or(Ok(()), Err)
    }

    fn missing_field(&self, field: &str) -> ConfigError {
        ConfigError::MissingField {
            field: field.to_string(),
            section: (!self.path.is_empty()).then(|| self.current_path()),
        }
    }

    fn invalid_value(&self, field: &str, reason: impl Into<String>) -> ConfigError {
        let field = if self.path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{field}", self.current_path())
        };
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Fluent field checks that record into a [`ValidationContext`].
#[derive(Debug)]
pub struct Validator<'a> {
    ctx: &'a mut ValidationContext,
}

impl<'a> Validator<'a> {
    /// Creates a validator over the given context.
    pub fn new(ctx: &'a mut ValidationContext) -> Self {
        Self { ctx }
    }

    /// String must not be empty.
    pub fn require_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            let error = self.ctx.missing_field(field);
            self.ctx.add_error(error);
        }
        self
    }

    /// Value must be greater than zero.
    pub fn positive<T: PartialOrd + Default + Display>(
        &mut self,
        field: &str,
        value: &T,
    ) -> &mut Self {
        if *value <= T::default() {
            let error = self
                .ctx
                .invalid_value(field, format!("Value {value} must be positive"));
            self.ctx.add_error(error);
        }
        self
    }

    /// `value` must not be below `floor`, which is named by `floor_field`.
    pub fn at_least<T: PartialOrd + Display>(
        &mut self,
        field: &str,
        value: &T,
        floor_field: &str,
        floor: &T,
    ) -> &mut Self {
        if value < floor {
            let error = self.ctx.invalid_value(
                field,
                format!("Value {value} must not be below {floor_field} ({floor})"),
            );
            self.ctx.add_error(error);
        }
        self
    }

    /// Custom predicate.
    pub fn custom(&mut self, field: &str, valid: bool, error_msg: &str) -> &mut Self {
        if !valid {
            let error = self.ctx.invalid_value(field, error_msg);
            self.ctx.add_error(error);
        }
        self
    }

    /// Non-empty values must start with one of the given URL schemes.
    pub fn url_with_scheme(&mut self, field: &str, value: &str, schemes: &[&str]) -> &mut Self {
        let ok = schemes
            .iter()
            .any(|scheme| value.starts_with(&format!("{scheme}://")));
        if !value.is_empty() && !ok {
            let error = self.ctx.invalid_value(
                field,
                format!("Must be a URL with scheme {}", schemes.join(" or ")),
            );
            self.ctx.add_error(error);
        }
        self
    }

    /// First error recorded so far, if any.
    pub fn result(&self) -> ValidationResult {
        self.ctx.errors().first().cloned().map_or(Ok(()), Err)
    }
}

/// Environment variable helpers for applying overrides.
///
/// Unset variables and unparsable values leave the target untouched.
pub struct EnvOverride;

impl EnvOverride {
    /// Overrides a string.
    pub fn apply_string(var_name: &str, target: &mut String) {
        if let Ok(value) = std::env::var(var_name) {
            *target = value;
        }
    }

    /// Overrides an optional string.
    pub fn apply_optional_string(var_name: &str, target: &mut Option<String>) {
        if let Ok(value) = std::env::var(var_name) {
            *target = Some(value);
        }
    }

    /// Overrides any `FromStr` value, e.g. millisecond durations and counts.
    pub fn apply_number<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(value) = std::env::var(var_name)
            && let Ok(parsed) = value.trim().parse()
        {
            *target = parsed;
        }
    }

    /// Overrides a boolean (`true/1/yes/on`, `false/0/no/off`).
    pub fn apply_bool(var_name: &str, target: &mut bool) {
        if let Ok(value) = std::env::var(var_name) {
            match value.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => *target = true,
                "false" | "0" | "no" | "off" => *target = false,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_prefixes_field_with_path() {
        let mut ctx = ValidationContext::new();
        ctx.enter("poll");
        Validator::new(&mut ctx).positive("interval_ms", &0u64);
        ctx.exit();

        let errors = ctx.errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ConfigError::InvalidValue { field, .. } if field == "poll.interval_ms"
        ));
    }

    #[test]
    fn test_missing_field_carries_section() {
        let mut ctx = ValidationContext::new();
        ctx.enter("rest");
        Validator::new(&mut ctx).require_non_empty("base_url", "  ");
        assert!(matches!(
            ctx.into_result(),
            Err(ConfigError::MissingField { section: Some(s), .. }) if s == "rest"
        ));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut ctx = ValidationContext::new();
        Validator::new(&mut ctx)
            .positive("attempts", &0u32)
            .at_least("max_ms", &100u64, "base_ms", &500)
            .url_with_scheme("url", "ftp://x", &["ws", "wss"]);
        assert_eq!(ctx.errors().len(), 3);
    }

    #[test]
    fn test_url_with_scheme_accepts_empty_and_matching() {
        let mut ctx = ValidationContext::new();
        Validator::new(&mut ctx)
            .url_with_scheme("socket_url", "", &["ws", "wss"])
            .url_with_scheme("socket_url", "wss://rt.example.com", &["ws", "wss"]);
        assert!(ctx.is_valid());
    }

    #[test]
    fn test_env_override_ignores_garbage() {
        // SAFETY: unique variable name, not read by other tests.
        unsafe { std::env::set_var("TIDINGS_VALIDATION_TEST_NUM", "soon") };
        let mut value = 5u64;
        EnvOverride::apply_number("TIDINGS_VALIDATION_TEST_NUM", &mut value);
        assert_eq!(value, 5);
        unsafe { std::env::remove_var("TIDINGS_VALIDATION_TEST_NUM") };
    }
}
