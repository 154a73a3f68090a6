//! # Tidings Core
//!
//! Core types and interfaces shared by the tidings real-time delivery client.
//!
//! This crate provides:
//! - Channel, message and credential types used by every transport
//! - Error types and handling framework
//! - An injectable clock so time-dependent policies are testable
//! - Configuration management with YAML/TOML/JSON support and environment variable overrides

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]

/// Channel, message and token types
pub mod types;

/// Error types and handling
pub mod error;

/// Time sources
pub mod clock;

/// Configuration management
pub mod config;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::config::*;
    pub use crate::error::{Result, TidingsError};
    pub use crate::types::*;
}
