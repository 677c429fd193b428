//! Per-pool decision loop.
//!
//! Every `interval`: collect a snapshot, read the pool size, decide, and
//! apply the action through the shared controller. After a resize the loop
//! waits out the cooldown before its next interval. Metrics failures end
//! the loop; pool-service failures skip one cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use poolscale_core::{Action, MetricsSnapshot, PoolLimits, Thresholds};
use poolscale_metrics::MetricsCollector;
use poolscale_pool::{InstancePoolController, ResizeOutcome};
use poolscale_scheduler::ActiveFlag;

use crate::decision::{Decision, DecisionReason, decide};
use crate::error::AutoscaleResult;

/// What one decision cycle saw and did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub metrics: MetricsSnapshot,
    pub size: u32,
    pub decision: Decision,
    pub outcome: ResizeOutcome,
}

/// Decision loop for one pool.
pub struct PoolAutoscaler {
    controller: Arc<InstancePoolController>,
    collector: Arc<dyn MetricsCollector>,
    thresholds: Thresholds,
    schedule: ActiveFlag,
    interval: Duration,
    cooldown: Duration,
}

impl PoolAutoscaler {
    pub fn new(
        controller: Arc<InstancePoolController>,
        collector: Arc<dyn MetricsCollector>,
        thresholds: Thresholds,
        schedule: ActiveFlag,
    ) -> Self {
        Self {
            controller,
            collector,
            thresholds,
            schedule,
            interval: Duration::from_secs(300),
            cooldown: Duration::from_secs(900),
        }
    }

    /// Time between decision cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Wait after a successful resize before the next interval starts.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn limits(&self) -> PoolLimits {
        self.controller.limits()
    }

    /// Run one decision cycle.
    pub async fn run_cycle(&self) -> AutoscaleResult<CycleReport> {
        let pool = self.controller.pool();

        let metrics = self.collector.get_metrics().await?;
        let size = self.controller.current_size().await?;
        let scheduler_active = self.schedule.is_active();

        let decision = decide(
            &metrics,
            &self.thresholds,
            self.controller.limits(),
            size,
            scheduler_active,
        );

        match decision.reason {
            DecisionReason::InvalidReading => {
                error!(%pool, %metrics, "invalid metric reading, skipping scaling")
            }
            DecisionReason::NoData => warn!(%pool, "no metric data, skipping scaling"),
            DecisionReason::LoadLowDeferred => {
                warn!(%pool, %metrics, size, "scale-down deferred: schedule window active")
            }
            _ => {}
        }
        info!(
            %pool,
            %metrics,
            size,
            scheduler_active,
            action = %decision.action,
            reason = %decision.reason,
            "scaling decision"
        );

        let outcome = match decision.action {
            Action::NoAction => ResizeOutcome::Unchanged { size: Some(size) },
            action => self.controller.apply(action).await?,
        };

        Ok(CycleReport {
            metrics,
            size,
            decision,
            outcome,
        })
    }

    /// Loop until shutdown or a fatal metrics error.
    ///
    /// Returns `Ok(())` on shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> AutoscaleResult<()> {
        let pool = self.controller.pool().clone();
        info!(
            %pool,
            method = self.collector.method().as_str(),
            interval_secs = self.interval.as_secs(),
            cooldown_secs = self.cooldown.as_secs(),
            thresholds = %self.thresholds,
            "decision loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle().await {
                Ok(report) if report.outcome.is_resized() => {
                    info!(%pool, cooldown_secs = self.cooldown.as_secs(), "cooling down after resize");
                    if !wait(self.cooldown, &mut shutdown).await {
                        break;
                    }
                }
                Ok(report) => debug!(%pool, outcome = ?report.outcome, "cycle complete"),
                Err(e) if e.is_fatal() => {
                    error!(%pool, error = %e, "decision loop stopped");
                    return Err(e);
                }
                Err(e) => warn!(%pool, error = %e, "decision cycle skipped"),
            }

            if !wait(self.interval, &mut shutdown).await {
                break;
            }
        }

        info!(%pool, "decision loop shutting down");
        Ok(())
    }
}

/// Sleep for `period`; `false` when shutdown fired first.
async fn wait(period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => true,
        _ = shutdown.changed() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use poolscale_core::{MemoryPool, MonitoringMethod, PoolRef, ResourceThreshold};
    use poolscale_metrics::{
        Datapoint, MetricsError, MetricsResult, MonitoringApi, MonitoringCollector, MonitoringQuery,
    };
    use poolscale_scheduler::ScheduleWindowManager;

    use crate::error::AutoscaleError;

    /// Replays snapshots in order, repeating the last one.
    struct Scripted {
        script: Mutex<Vec<MetricsResult<MetricsSnapshot>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(script: Vec<MetricsResult<MetricsSnapshot>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl MetricsCollector for Scripted {
        async fn get_metrics(&self) -> MetricsResult<MetricsSnapshot> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                match script.first() {
                    Some(Ok(m)) => Ok(*m),
                    _ => Err(MetricsError::EmptyPool {
                        pool: "pool-1".to_string(),
                    }),
                }
            }
        }

        fn method(&self) -> MonitoringMethod {
            MonitoringMethod::Provider
        }
    }

    /// Every instance reports the same utilization.
    struct SteadyLoad(f64);

    #[async_trait]
    impl MonitoringApi for SteadyLoad {
        async fn summarize(&self, query: &MonitoringQuery) -> anyhow::Result<Vec<Datapoint>> {
            Ok(vec![Datapoint {
                timestamp: query.end_time,
                value: self.0,
            }])
        }
    }

    fn thresholds() -> Thresholds {
        Thresholds {
            cpu: ResourceThreshold { min: 20.0, max: 80.0 },
            ram: ResourceThreshold { min: 20.0, max: 80.0 },
        }
    }

    fn autoscaler(
        pool: &MemoryPool,
        limits: PoolLimits,
        collector: Arc<Scripted>,
        schedule: ActiveFlag,
    ) -> PoolAutoscaler {
        let controller = Arc::new(InstancePoolController::new(
            PoolRef::new("pool-1", "compartment-1", "eu-frankfurt-1"),
            Arc::new(pool.clone()),
            limits,
        ));
        PoolAutoscaler::new(controller, collector, thresholds(), schedule)
            .with_interval(Duration::from_secs(300))
            .with_cooldown(Duration::from_secs(900))
    }

    const LIMITS: PoolLimits = PoolLimits { min: 2, max: 6 };

    #[tokio::test]
    async fn high_load_adds_one_instance() {
        let pool = MemoryPool::new(3);
        let scaler = autoscaler(&pool, LIMITS, Scripted::new(vec![Ok(MetricsSnapshot::new(90.0, 50.0))]), ActiveFlag::new());

        let report = scaler.run_cycle().await.unwrap();
        assert_eq!(report.decision.action, Action::ScaleUp);
        assert_eq!(report.outcome, ResizeOutcome::Resized { from: 3, to: 4 });
        assert_eq!(pool.size(), 4);
    }

    #[tokio::test]
    async fn low_load_removes_one_instance() {
        let pool = MemoryPool::new(4);
        let scaler = autoscaler(&pool, LIMITS, Scripted::new(vec![Ok(MetricsSnapshot::new(5.0, 50.0))]), ActiveFlag::new());

        let report = scaler.run_cycle().await.unwrap();
        assert_eq!(report.decision.reason, DecisionReason::LoadLow);
        assert_eq!(pool.size(), 3);
    }

    #[tokio::test]
    async fn no_data_leaves_pool_alone() {
        let pool = MemoryPool::new(1);
        let scaler = autoscaler(&pool, LIMITS, Scripted::new(vec![Ok(MetricsSnapshot::default())]), ActiveFlag::new());

        let report = scaler.run_cycle().await.unwrap();
        assert_eq!(report.outcome, ResizeOutcome::Unchanged { size: Some(1) });
        assert!(pool.resize_calls().is_empty());
    }

    #[tokio::test]
    async fn below_minimum_is_restored() {
        let pool = MemoryPool::new(1);
        let scaler = autoscaler(&pool, LIMITS, Scripted::new(vec![Ok(MetricsSnapshot::new(5.0, 5.0))]), ActiveFlag::new());

        let report = scaler.run_cycle().await.unwrap();
        assert_eq!(report.decision.reason, DecisionReason::BelowMinimum);
        assert_eq!(pool.size(), 2);
    }

    #[tokio::test]
    async fn scheduled_window_blocks_load_scale_down() {
        let pool = MemoryPool::new(4);
        let controller = Arc::new(InstancePoolController::new(
            PoolRef::new("pool-1", "compartment-1", "eu-frankfurt-1"),
            Arc::new(pool.clone()),
            LIMITS,
        ));
        let mut schedule = ScheduleWindowManager::new(
            controller.clone(),
            vec![poolscale_core::ScheduleWindow {
                start_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                target_instances: 2,
            }],
            Duration::from_secs(60),
        );
        schedule
            .tick_at(chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap())
            .await;
        assert_eq!(pool.size(), 6);

        let scaler = PoolAutoscaler::new(
            controller,
            Scripted::new(vec![Ok(MetricsSnapshot::new(5.0, 5.0))]),
            thresholds(),
            schedule.active_flag(),
        );
        let report = scaler.run_cycle().await.unwrap();
        assert_eq!(report.decision.reason, DecisionReason::LoadLowDeferred);
        assert_eq!(pool.size(), 6);
    }

    #[tokio::test]
    async fn pool_status_failure_is_not_fatal() {
        let pool = MemoryPool::new(3);
        let scaler = autoscaler(&pool, LIMITS, Scripted::new(vec![Ok(MetricsSnapshot::new(90.0, 90.0))]), ActiveFlag::new());

        pool.fail_status(true);
        let err = scaler.run_cycle().await.unwrap_err();
        assert!(!err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_follows_resize() {
        let pool = MemoryPool::new(3);
        let collector = Scripted::new(vec![Ok(MetricsSnapshot::new(90.0, 90.0))]);
        let scaler = autoscaler(&pool, LIMITS, collector.clone(), ActiveFlag::new());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scaler.run(rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(collector.calls(), 1);
        assert_eq!(pool.size(), 4);

        // Cooldown (900s) plus interval (300s) before the next cycle.
        tokio::time::sleep(Duration::from_secs(1100)).await;
        assert_eq!(collector.calls(), 1);
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(collector.calls(), 2);
        assert_eq!(pool.size(), 5);

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn member_listing_outage_skips_cycle() {
        let pool = MemoryPool::new(3);
        let pool_ref = PoolRef::new("pool-1", "compartment-1", "eu-frankfurt-1");
        let api: Arc<dyn poolscale_core::PoolApi> = Arc::new(pool.clone());
        let controller = Arc::new(InstancePoolController::new(pool_ref.clone(), api.clone(), LIMITS));
        let collector = Arc::new(MonitoringCollector::new(pool_ref, api, Arc::new(SteadyLoad(90.0))));
        let scaler = PoolAutoscaler::new(controller, collector, thresholds(), ActiveFlag::new())
            .with_interval(Duration::from_secs(300))
            .with_cooldown(Duration::from_secs(900));

        pool.fail_status(true);
        let err = scaler.run_cycle().await.unwrap_err();
        assert!(matches!(err, AutoscaleError::Metrics(MetricsError::Membership { .. })));
        assert!(!err.is_fatal());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scaler.run(rx));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!handle.is_finished());
        assert_eq!(pool.size(), 3);

        pool.fail_status(false);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(!handle.is_finished());
        assert_eq!(pool.size(), 4);

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn resize_failure_retries_next_interval_without_cooldown() {
        let pool = MemoryPool::new(3);
        let collector = Scripted::new(vec![Ok(MetricsSnapshot::new(90.0, 90.0))]);
        let scaler = autoscaler(&pool, LIMITS, collector.clone(), ActiveFlag::new());

        pool.fail_resizes(true);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scaler.run(rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(collector.calls(), 1);
        assert_eq!(pool.size(), 3);
        assert!(!handle.is_finished());

        pool.fail_resizes(false);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(collector.calls(), 2);
        assert_eq!(pool.size(), 4);

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn no_cooldown_without_resize() {
        let pool = MemoryPool::new(3);
        let collector = Scripted::new(vec![Ok(MetricsSnapshot::new(50.0, 50.0))]);
        let scaler = autoscaler(&pool, LIMITS, collector.clone(), ActiveFlag::new());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scaler.run(rx));

        tokio::time::sleep(Duration::from_secs(301 * 3)).await;
        assert_eq!(collector.calls(), 4);
        assert!(pool.resize_calls().is_empty());

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn metrics_failure_ends_loop() {
        let pool = MemoryPool::new(3);
        let collector = Scripted::new(vec![
            Ok(MetricsSnapshot::new(50.0, 50.0)),
            Err(MetricsError::EmptyPool {
                pool: "pool-1".to_string(),
            }),
        ]);
        let scaler = autoscaler(&pool, LIMITS, collector.clone(), ActiveFlag::new());
        let (_tx, rx) = watch::channel(false);

        let result = scaler.run(rx).await;
        assert!(matches!(result, Err(AutoscaleError::Metrics(MetricsError::EmptyPool { .. }))));
        assert_eq!(collector.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_cooldown() {
        let pool = MemoryPool::new(3);
        let collector = Scripted::new(vec![Ok(MetricsSnapshot::new(90.0, 90.0))]);
        let scaler = autoscaler(&pool, LIMITS, collector.clone(), ActiveFlag::new());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scaler.run(rx));

        tokio::time::sleep(Duration::from_secs(10)).await;
        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
        assert_eq!(collector.calls(), 1);
    }
}
