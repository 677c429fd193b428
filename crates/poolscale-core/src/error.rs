//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
///
/// Validation errors are per pool: one invalid pool never prevents the
/// others from being managed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("pool {pool}: missing required field `{field}`")]
    MissingField { pool: String, field: &'static str },

    #[error("pool {pool}: limits.min ({min}) exceeds limits.max ({max})")]
    InvalidLimits { pool: String, min: u32, max: u32 },

    #[error("pool {pool}: unknown region alias `{region}`")]
    UnknownRegion { pool: String, region: String },

    #[error("pool {pool}: schedule #{index} has no target_instances and no scheduler_instances default")]
    MissingScheduleTarget { pool: String, index: usize },

    #[error("invalid time of day `{0}` (expected HH:MM or HH:MM:SS)")]
    InvalidTime(String),

    #[error("invalid duration `{0}`")]
    InvalidDuration(String),

    #[error("pool {pool}: {method} monitoring requires a {source_kind} source")]
    MissingSource {
        pool: String,
        method: &'static str,
        source_kind: &'static str,
    },
}
