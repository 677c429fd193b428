//! Collector error types.

use thiserror::Error;

/// Reasons a pool's metrics could not be collected.
///
/// `Membership` is a pool-service failure and only costs one cycle. The
/// other variants mean metrics are unavailable for the pool.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("no instances found in pool {pool}")]
    EmptyPool { pool: String },

    #[error("failed to list members of pool {pool}: {message}")]
    Membership { pool: String, message: String },

    #[error("metric source unreachable for pool {pool}: {message}")]
    SourceUnreachable { pool: String, message: String },

    #[error("no {metric} series for instance {instance} in pool {pool}")]
    MissingSeries {
        pool: String,
        instance: String,
        metric: &'static str,
    },
}

impl MetricsError {
    /// Whether metrics are unavailable for the pool rather than for one cycle.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, MetricsError::Membership { .. })
    }
}

pub type MetricsResult<T> = Result<T, MetricsError>;
