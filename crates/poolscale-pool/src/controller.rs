//! Instance pool controller: bounded, serialized resizes.
//!
//! Every mutation re-reads the size from the provider while holding the
//! pool's mutex, so the decision made is always against the latest size
//! and a concurrent caller waits for the resize to land before reading.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use poolscale_core::{Action, PoolApi, PoolLimits, PoolRef};

use crate::error::{PoolError, PoolResult};

/// What a resize request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// The provider accepted the new size.
    Resized { from: u32, to: u32 },
    /// The request violated a bound; nothing was sent to the provider.
    Rejected { current: u32, delta: i64 },
    /// Nothing was requested.
    Unchanged { size: Option<u32> },
}

impl ResizeOutcome {
    pub fn is_resized(&self) -> bool {
        matches!(self, ResizeOutcome::Resized { .. })
    }
}

/// Reads and resizes one managed pool.
///
/// Cheap to share behind an `Arc`; the decision loop and the schedule loop
/// of a pool hold the same controller.
pub struct InstancePoolController {
    pool: PoolRef,
    api: Arc<dyn PoolApi>,
    limits: PoolLimits,
    /// Last size read from or written to the provider. The mutex also
    /// serializes all resizes of this pool.
    tracked: Mutex<Option<u32>>,
}

impl InstancePoolController {
    pub fn new(pool: PoolRef, api: Arc<dyn PoolApi>, limits: PoolLimits) -> Self {
        Self {
            pool,
            api,
            limits,
            tracked: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// The locally tracked size, without asking the provider.
    pub async fn tracked_size(&self) -> Option<u32> {
        *self.tracked.lock().await
    }

    /// Read the size from the provider and refresh the tracked value.
    pub async fn current_size(&self) -> PoolResult<u32> {
        let mut tracked = self.tracked.lock().await;
        let size = self.read_size().await?;
        *tracked = Some(size);
        Ok(size)
    }

    /// Grow the pool by `count`, unless that would exceed `limits.max`.
    pub async fn add_instances(&self, count: u32) -> PoolResult<ResizeOutcome> {
        let mut tracked = self.tracked.lock().await;
        let current = self.read_size().await?;
        *tracked = Some(current);

        match current.checked_add(count).filter(|t| *t <= self.limits.max) {
            Some(target) => self.resize_locked(&mut tracked, current, target).await,
            None => {
                warn!(
                    pool = %self.pool,
                    current,
                    count,
                    max = self.limits.max,
                    "cannot add instances: pool maximum would be exceeded"
                );
                Ok(ResizeOutcome::Rejected {
                    current,
                    delta: i64::from(count),
                })
            }
        }
    }

    /// Shrink the pool by `count`, unless the size would go negative.
    pub async fn remove_instances(&self, count: u32) -> PoolResult<ResizeOutcome> {
        let mut tracked = self.tracked.lock().await;
        let current = self.read_size().await?;
        *tracked = Some(current);

        match current.checked_sub(count) {
            Some(target) => self.resize_locked(&mut tracked, current, target).await,
            None => {
                warn!(
                    pool = %self.pool,
                    current,
                    count,
                    "cannot remove instances: pool size would be negative"
                );
                Ok(ResizeOutcome::Rejected {
                    current,
                    delta: -i64::from(count),
                })
            }
        }
    }

    /// Execute a threshold-driven action: one instance up or down.
    ///
    /// Scale-down is refused once the pool is at or below `limits.min`, so a
    /// load-driven shrink never undoes bound restoration.
    pub async fn apply(&self, action: Action) -> PoolResult<ResizeOutcome> {
        match action {
            Action::ScaleUp => self.add_instances(1).await,
            Action::ScaleDown => {
                let mut tracked = self.tracked.lock().await;
                let current = self.read_size().await?;
                *tracked = Some(current);

                if current <= self.limits.min {
                    warn!(
                        pool = %self.pool,
                        current,
                        min = self.limits.min,
                        "cannot scale down: pool is at its minimum"
                    );
                    return Ok(ResizeOutcome::Rejected { current, delta: -1 });
                }
                self.resize_locked(&mut tracked, current, current - 1).await
            }
            Action::NoAction => Ok(ResizeOutcome::Unchanged {
                size: *self.tracked.lock().await,
            }),
        }
    }

    async fn read_size(&self) -> PoolResult<u32> {
        let status = self
            .api
            .pool_status(&self.pool)
            .await
            .map_err(|e| PoolError::Status {
                pool: self.pool.pool_id.clone(),
                message: format!("{e:#}"),
            })?;
        debug!(pool = %self.pool, size = status.size, "pool size read");
        Ok(status.size)
    }

    /// Issue the resize while the caller holds the tracked-size lock.
    async fn resize_locked(
        &self,
        tracked: &mut Option<u32>,
        from: u32,
        to: u32,
    ) -> PoolResult<ResizeOutcome> {
        info!(pool = %self.pool, from, to, "resizing pool");
        match self.api.resize(&self.pool, to).await {
            Ok(()) => {
                *tracked = Some(to);
                info!(pool = %self.pool, from, to, "pool resized");
                Ok(ResizeOutcome::Resized { from, to })
            }
            Err(e) => {
                error!(pool = %self.pool, from, to, error = %format!("{e:#}"), "pool resize failed");
                Err(PoolError::Resize {
                    pool: self.pool.pool_id.clone(),
                    size: to,
                    message: format!("{e:#}"),
                })
            }
        }
    }
}
