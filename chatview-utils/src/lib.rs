//! chatview-utils: Common utilities shared across chatview crates
//!
//! This crate provides:
//! - Unified error types ([`ChatviewError`], [`Result`])
//! - Logging infrastructure ([`init_logging_with_config`], [`LogConfig`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{ChatviewError, Result};
pub use logging::{init_logging_with_config, LogConfig};

// Re-export commonly used path functions
pub use paths::{credentials_file, settings_file};
