//! Pool controller error types.

use thiserror::Error;

/// Errors from the external pool service, as seen by the controller.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("status query for pool {pool} failed: {message}")]
    Status { pool: String, message: String },

    #[error("resize of pool {pool} to {size} failed: {message}")]
    Resize {
        pool: String,
        size: u32,
        message: String,
    },
}

pub type PoolResult<T> = Result<T, PoolError>;
