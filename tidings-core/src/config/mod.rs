//! Configuration management module.
//!
//! - YAML, TOML and JSON configuration files
//! - Validation with descriptive error messages
//! - Environment variable overrides
//!
//! ```rust,ignore
//! use tidings_core::config::ConfigLoader;
//!
//! let config: ClientConfig = ConfigLoader::new()
//!     .with_env_prefix("TIDINGS")
//!     .load_file("tidings.yaml")?;
//! ```

mod loader;
mod traits;
pub mod validation;

pub use loader::{ConfigFormat, ConfigLoader};
pub use traits::{Configurable, Validatable};
pub use validation::{EnvOverride, ValidationContext, ValidationResult, Validator};
