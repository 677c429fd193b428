//! The collector capability and helpers shared by its implementations.

use async_trait::async_trait;
use tracing::debug;

use poolscale_core::{MetricsSnapshot, MonitoringMethod, PoolApi, PoolMember, PoolRef};

use crate::error::{MetricsError, MetricsResult};

/// Produces a utilization snapshot for one pool.
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    /// Average CPU and memory utilization across the pool's members.
    ///
    /// Fails when the pool has no members or the source cannot be reached.
    async fn get_metrics(&self) -> MetricsResult<MetricsSnapshot>;

    /// Which source this collector reads.
    fn method(&self) -> MonitoringMethod;
}

/// List the pool's members, failing on an empty pool.
pub(crate) async fn pool_members(
    api: &dyn PoolApi,
    pool: &PoolRef,
) -> MetricsResult<Vec<PoolMember>> {
    let status = api
        .pool_status(pool)
        .await
        .map_err(|e| MetricsError::Membership {
            pool: pool.pool_id.clone(),
            message: format!("{e:#}"),
        })?;

    if status.members.is_empty() {
        return Err(MetricsError::EmptyPool {
            pool: pool.pool_id.clone(),
        });
    }

    debug!(
        %pool,
        members = status.members.len(),
        "pool members listed for collection"
    );
    Ok(status.members)
}

/// Average per-instance `(cpu, ram)` readings.
///
/// Returns the no-data snapshot `(0, 0)` for an empty slice.
pub(crate) fn average(readings: &[(f64, f64)]) -> MetricsSnapshot {
    if readings.is_empty() {
        return MetricsSnapshot::default();
    }
    let count = readings.len() as f64;
    let (cpu, ram) = readings
        .iter()
        .fold((0.0, 0.0), |(c, r), (cpu, ram)| (c + cpu, r + ram));
    MetricsSnapshot::new(cpu / count, ram / count)
}
