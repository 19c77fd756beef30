//! Error types.

use thiserror::Error;

/// Crate error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A configuration value is out of range.
    #[error("Invalid setting `{key}`: {reason}")]
    InvalidSetting {
        /// Dotted config key.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Socket or filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
