//! Pool supervisor: two background loops per managed pool.
//!
//! For every pool the supervisor spawns a decision loop and, when the pool
//! has schedule windows, a schedule loop. Both share one
//! `InstancePoolController` and one shutdown channel. A pool that fails to
//! start, or whose decision loop dies, never affects the others.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use poolscale_core::{AutoscalerConfig, PoolApi, PoolId, Timing, ValidatedPool};
use poolscale_metrics::{MetricSources, build_collector};
use poolscale_pool::InstancePoolController;
use poolscale_scheduler::{ActiveFlag, ScheduleWindowManager};

use crate::autoscaler::PoolAutoscaler;
use crate::error::{AutoscaleError, AutoscaleResult};

/// Per-pool task state.
struct PoolSlot {
    decision: JoinHandle<AutoscaleResult<()>>,
    schedule: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    active: ActiveFlag,
}

/// Runs and stops the loops of every managed pool.
pub struct PoolSupervisor {
    pool_api: Arc<dyn PoolApi>,
    sources: MetricSources,
    timing: Timing,
    /// Running pools: pool_id → slot.
    pools: Arc<RwLock<HashMap<PoolId, PoolSlot>>>,
}

impl PoolSupervisor {
    pub fn new(pool_api: Arc<dyn PoolApi>, sources: MetricSources, timing: Timing) -> Self {
        Self {
            pool_api,
            sources,
            timing,
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start the loops for one validated pool.
    pub async fn start(&self, pool: &ValidatedPool) -> AutoscaleResult<()> {
        let pool_id = pool.pool.pool_id.clone();
        if self.pools.read().await.contains_key(&pool_id) {
            return Err(AutoscaleError::AlreadySupervised(pool_id));
        }

        let collector = build_collector(pool, self.pool_api.clone(), &self.sources)?;
        let controller = Arc::new(InstancePoolController::new(
            pool.pool.clone(),
            self.pool_api.clone(),
            pool.limits,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (active, schedule) = if pool.windows.is_empty() {
            debug!(pool = %pool.pool, "no schedule windows, schedule loop not started");
            (ActiveFlag::new(), None)
        } else {
            let manager = ScheduleWindowManager::new(
                controller.clone(),
                pool.windows.clone(),
                self.timing.schedule_tick,
            );
            let active = manager.active_flag();
            let handle = tokio::spawn(manager.run(shutdown_rx.clone()));
            (active, Some(handle))
        };

        let autoscaler = PoolAutoscaler::new(controller, collector, pool.thresholds, active.clone())
            .with_interval(self.timing.decision_interval)
            .with_cooldown(self.timing.cooldown);
        let decision = tokio::spawn(autoscaler.run(shutdown_rx));

        self.pools.write().await.insert(
            pool_id.clone(),
            PoolSlot {
                decision,
                schedule,
                shutdown_tx,
                active,
            },
        );

        info!(
            pool = %pool.pool,
            limits_min = pool.limits.min,
            limits_max = pool.limits.max,
            windows = pool.windows.len(),
            "pool supervised"
        );
        Ok(())
    }

    /// Validate and start every pool in `config`.
    ///
    /// Returns the pools that could not be started; the rest run.
    pub async fn start_all(&self, config: &AutoscalerConfig) -> Vec<(PoolId, AutoscaleError)> {
        let mut failed = Vec::new();
        for (pool_id, validated) in config.validate_all() {
            let result = match validated {
                Ok(pool) => self.start(&pool).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                error!(pool = %pool_id, error = %e, "pool not started");
                failed.push((pool_id, e));
            }
        }
        info!(
            running = self.pools.read().await.len(),
            failed = failed.len(),
            "supervisor started"
        );
        failed
    }

    /// Stop one pool's loops and wait for them to finish.
    ///
    /// Returns the decision loop's result, or `None` if the pool was not
    /// supervised.
    pub async fn stop(&self, pool_id: &str) -> Option<AutoscaleResult<()>> {
        let slot = self.pools.write().await.remove(pool_id)?;
        let result = shutdown_slot(pool_id, slot).await;
        info!(pool = %pool_id, "pool supervision stopped");
        Some(result)
    }

    /// Stop every pool (for graceful shutdown).
    pub async fn stop_all(&self) {
        let slots: Vec<_> = self.pools.write().await.drain().collect();
        for (pool_id, slot) in slots {
            let _ = shutdown_slot(&pool_id, slot).await;
        }
        info!("all pools stopped");
    }

    /// Pool IDs currently supervised.
    pub async fn supervised(&self) -> Vec<PoolId> {
        let mut ids: Vec<_> = self.pools.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether a schedule window is active for the pool.
    pub async fn schedule_active(&self, pool_id: &str) -> Option<bool> {
        let pools = self.pools.read().await;
        pools.get(pool_id).map(|slot| slot.active.is_active())
    }

    /// Whether the pool's decision loop has exited.
    pub async fn decision_finished(&self, pool_id: &str) -> Option<bool> {
        let pools = self.pools.read().await;
        pools.get(pool_id).map(|slot| slot.decision.is_finished())
    }
}

async fn shutdown_slot(pool_id: &str, slot: PoolSlot) -> AutoscaleResult<()> {
    let _ = slot.shutdown_tx.send(true);

    if let Some(schedule) = slot.schedule
        && let Err(e) = schedule.await
    {
        warn!(pool = %pool_id, error = %e, "schedule loop did not exit cleanly");
    }

    match slot.decision.await {
        Ok(result) => {
            if let Err(e) = &result {
                debug!(pool = %pool_id, error = %e, "decision loop had already stopped");
            }
            result
        }
        Err(e) => {
            warn!(pool = %pool_id, error = %e, "decision loop did not exit cleanly");
            Ok(())
        }
    }
}
