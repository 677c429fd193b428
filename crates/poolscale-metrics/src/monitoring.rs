//! Provider-monitoring collector.
//!
//! For every pool member, asks the provider's monitoring service for the
//! max-aggregated CPU and memory utilization over the last five minutes and
//! averages the first datapoint of each across the pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use poolscale_core::{MetricsSnapshot, MonitoringMethod, PoolApi, PoolRef};

use crate::collector::{MetricsCollector, average, pool_members};
use crate::error::{MetricsError, MetricsResult};

/// Metric namespace the provider's compute agent publishes into.
pub const AGENT_NAMESPACE: &str = "oci_computeagent";

/// Lookback window for each query.
pub const QUERY_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMetric {
    Cpu,
    Memory,
}

impl ResourceMetric {
    /// Provider metric name.
    pub fn name(&self) -> &'static str {
        match self {
            ResourceMetric::Cpu => "CpuUtilization",
            ResourceMetric::Memory => "MemoryUtilization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Max,
    Mean,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Max => "max",
            Aggregation::Mean => "mean",
        }
    }
}

/// One windowed, aggregated query for a single instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringQuery {
    pub compartment_id: String,
    pub namespace: &'static str,
    pub metric: ResourceMetric,
    pub resource_id: String,
    pub window: Duration,
    pub aggregation: Aggregation,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl MonitoringQuery {
    /// Query for `metric` on `resource_id` over the window ending at `end_time`.
    pub fn new(
        pool: &PoolRef,
        metric: ResourceMetric,
        resource_id: &str,
        end_time: DateTime<Utc>,
    ) -> Self {
        let start_time = end_time
            - chrono::Duration::from_std(QUERY_WINDOW).unwrap_or(chrono::Duration::minutes(5));
        Self {
            compartment_id: pool.compartment_id.clone(),
            namespace: AGENT_NAMESPACE,
            metric,
            resource_id: resource_id.to_string(),
            window: QUERY_WINDOW,
            aggregation: Aggregation::Max,
            start_time,
            end_time,
        }
    }

    /// The query expression, e.g. `CpuUtilization[5m]{resourceId = "id"}.max()`.
    pub fn expression(&self) -> String {
        format!(
            "{}[{}]{{resourceId = \"{}\"}}.{}()",
            self.metric.name(),
            interval_label(self.window),
            self.resource_id,
            self.aggregation.as_str()
        )
    }

    /// Resolution label matching the window, e.g. `5m`.
    pub fn resolution(&self) -> String {
        interval_label(self.window)
    }
}

fn interval_label(window: Duration) -> String {
    let secs = window.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}m", (secs / 60).max(1))
    }
}

/// One aggregated datapoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Contract with the provider's monitoring service.
///
/// Returning no datapoints is a valid answer.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    async fn summarize(&self, query: &MonitoringQuery) -> anyhow::Result<Vec<Datapoint>>;
}

/// Collector backed by the provider monitoring service.
pub struct MonitoringCollector {
    pool: PoolRef,
    pool_api: Arc<dyn PoolApi>,
    monitoring: Arc<dyn MonitoringApi>,
}

impl MonitoringCollector {
    pub fn new(pool: PoolRef, pool_api: Arc<dyn PoolApi>, monitoring: Arc<dyn MonitoringApi>) -> Self {
        Self {
            pool,
            pool_api,
            monitoring,
        }
    }

    /// First datapoint's value, `Ok(0.0)` when there are none.
    async fn reading(
        &self,
        metric: ResourceMetric,
        instance_id: &str,
        end_time: DateTime<Utc>,
    ) -> anyhow::Result<f64> {
        let query = MonitoringQuery::new(&self.pool, metric, instance_id, end_time);
        let points = self.monitoring.summarize(&query).await?;
        match points.first() {
            Some(point) => Ok(point.value),
            None => {
                debug!(
                    pool = %self.pool,
                    instance = %instance_id,
                    metric = metric.name(),
                    "no datapoints, counting as 0"
                );
                Ok(0.0)
            }
        }
    }
}

#[async_trait]
impl MetricsCollector for MonitoringCollector {
    async fn get_metrics(&self) -> MetricsResult<MetricsSnapshot> {
        let members = pool_members(self.pool_api.as_ref(), &self.pool).await?;
        let end_time = Utc::now();

        let mut readings = Vec::with_capacity(members.len());
        let mut failed_queries = 0usize;
        let mut last_error = None;

        for member in &members {
            let (cpu, ram) = tokio::join!(
                self.reading(ResourceMetric::Cpu, &member.id, end_time),
                self.reading(ResourceMetric::Memory, &member.id, end_time),
            );

            let mut value = |result: anyhow::Result<f64>, metric: ResourceMetric| match result {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        pool = %self.pool,
                        instance = %member.id,
                        metric = metric.name(),
                        error = %format!("{e:#}"),
                        "monitoring query failed, counting as 0"
                    );
                    failed_queries += 1;
                    last_error = Some(format!("{e:#}"));
                    0.0
                }
            };
            let cpu = value(cpu, ResourceMetric::Cpu);
            let ram = value(ram, ResourceMetric::Memory);

            debug!(pool = %self.pool, instance = %member.id, cpu, ram, "instance utilization");
            readings.push((cpu, ram));
        }

        if failed_queries == members.len() * 2 {
            return Err(MetricsError::SourceUnreachable {
                pool: self.pool.pool_id.clone(),
                message: last_error.unwrap_or_else(|| "all queries failed".to_string()),
            });
        }

        let snapshot = average(&readings);
        info!(
            pool = %self.pool,
            instances = members.len(),
            avg_cpu = snapshot.avg_cpu,
            avg_ram = snapshot.avg_ram,
            "provider metrics collected"
        );
        Ok(snapshot)
    }

    fn method(&self) -> MonitoringMethod {
        MonitoringMethod::Provider
    }
}
