//! Autoscaler error types.

use thiserror::Error;

use poolscale_core::ConfigError;
use poolscale_metrics::MetricsError;
use poolscale_pool::PoolError;

/// Errors that can end or skip a pool's decision cycle.
#[derive(Debug, Error)]
pub enum AutoscaleError {
    /// Metrics could not be produced. Ends the pool's decision loop unless
    /// only the member listing failed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// The pool service failed; the cycle is skipped.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The pool could not be set up.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("pool already supervised: {0}")]
    AlreadySupervised(String),
}

impl AutoscaleError {
    /// Whether the error ends the decision loop rather than one cycle.
    pub fn is_fatal(&self) -> bool {
        match self {
            AutoscaleError::Metrics(e) => e.is_unavailable(),
            AutoscaleError::Pool(_) => false,
            AutoscaleError::Config(_) | AutoscaleError::AlreadySupervised(_) => true,
        }
    }
}

pub type AutoscaleResult<T> = Result<T, AutoscaleError>;
