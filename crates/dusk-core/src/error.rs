//! Error types for dusk core parsing and configuration.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while parsing tag values or loading configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid shutdown time {value:?}: expected HHMM (4 digits, 24h)")]
    InvalidShutdownTime { value: String },

    #[error("missing required configuration: {key} (env {env})")]
    ConfigurationMissing { key: &'static str, env: &'static str },

    #[error("invalid configuration value for {key}: {reason}")]
    ConfigurationInvalid { key: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
