//! Scrape-endpoint collector.
//!
//! Resolves each member's scrape target from its display name, runs the
//! instant CPU and memory queries, and averages across the pool. Partial
//! data is not tolerated: one member without a series fails the whole
//! collection.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use poolscale_core::{MetricsSnapshot, MonitoringMethod, PoolApi, PoolMember, PoolRef};

use crate::collector::{MetricsCollector, average, pool_members};
use crate::error::{MetricsError, MetricsResult};
use crate::prometheus::{cpu_utilization_query, memory_utilization_query};

/// One series value from an instant query.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

/// Contract with a metrics-scrape query endpoint.
#[async_trait]
pub trait ScrapeApi: Send + Sync {
    /// Evaluate `expr` at the current instant against `endpoint`.
    async fn instant_query(&self, endpoint: &str, expr: &str) -> anyhow::Result<Vec<Sample>>;
}

/// Collector backed by a scrape endpoint.
pub struct ScrapeCollector {
    pool: PoolRef,
    pool_api: Arc<dyn PoolApi>,
    scrape: Arc<dyn ScrapeApi>,
    endpoint: String,
    instance_suffix: String,
}

impl ScrapeCollector {
    pub fn new(
        pool: PoolRef,
        pool_api: Arc<dyn PoolApi>,
        scrape: Arc<dyn ScrapeApi>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            pool_api,
            scrape,
            endpoint: endpoint.into(),
            instance_suffix: String::new(),
        }
    }

    /// Append `suffix` (e.g. `:9100`) to display names when resolving targets.
    pub fn with_instance_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.instance_suffix = suffix.into();
        self
    }

    /// Scrape target for a pool member.
    pub fn target_for(&self, member: &PoolMember) -> String {
        format!("{}{}", member.display_name, self.instance_suffix)
    }

    async fn first_value(&self, expr: &str, target: &str, metric: &'static str) -> MetricsResult<f64> {
        let samples = self
            .scrape
            .instant_query(&self.endpoint, expr)
            .await
            .map_err(|e| MetricsError::SourceUnreachable {
                pool: self.pool.pool_id.clone(),
                message: format!("{}: {e:#}", self.endpoint),
            })?;

        samples
            .first()
            .map(|s| s.value)
            .ok_or_else(|| MetricsError::MissingSeries {
                pool: self.pool.pool_id.clone(),
                instance: target.to_string(),
                metric,
            })
    }
}

#[async_trait]
impl MetricsCollector for ScrapeCollector {
    async fn get_metrics(&self) -> MetricsResult<MetricsSnapshot> {
        let members = pool_members(self.pool_api.as_ref(), &self.pool).await?;

        let mut readings = Vec::with_capacity(members.len());
        for member in &members {
            let target = self.target_for(member);
            debug!(pool = %self.pool, %target, "querying scrape endpoint");

            let cpu = self
                .first_value(&cpu_utilization_query(&target), &target, "cpu")
                .await?;
            let ram = self
                .first_value(&memory_utilization_query(&target), &target, "memory")
                .await?;

            debug!(pool = %self.pool, %target, cpu, ram, "instance utilization");
            readings.push((cpu, ram));
        }

        let snapshot = average(&readings);
        info!(
            pool = %self.pool,
            instances = members.len(),
            avg_cpu = snapshot.avg_cpu,
            avg_ram = snapshot.avg_ram,
            "scrape metrics collected"
        );
        Ok(snapshot)
    }

    fn method(&self) -> MonitoringMethod {
        MonitoringMethod::Scrape
    }
}
