//! Collector selection from a pool's monitoring config.

use std::sync::Arc;

use tracing::debug;

use poolscale_core::{ConfigError, ConfigResult, MonitoringMethod, PoolApi, ValidatedPool};

use crate::collector::MetricsCollector;
use crate::monitoring::{MonitoringApi, MonitoringCollector};
use crate::scrape::{ScrapeApi, ScrapeCollector};

/// Metric backends available to the process.
///
/// Either may be absent; a pool configured for an absent backend is
/// rejected when its collector is built.
#[derive(Clone, Default)]
pub struct MetricSources {
    pub monitoring: Option<Arc<dyn MonitoringApi>>,
    pub scrape: Option<Arc<dyn ScrapeApi>>,
}

impl MetricSources {
    pub fn with_monitoring(mut self, api: Arc<dyn MonitoringApi>) -> Self {
        self.monitoring = Some(api);
        self
    }

    pub fn with_scrape(mut self, api: Arc<dyn ScrapeApi>) -> Self {
        self.scrape = Some(api);
        self
    }
}

/// Build the collector a validated pool asks for.
pub fn build_collector(
    pool: &ValidatedPool,
    pool_api: Arc<dyn PoolApi>,
    sources: &MetricSources,
) -> ConfigResult<Arc<dyn MetricsCollector>> {
    let method = pool.monitoring.method;
    let missing = |source_kind: &'static str| ConfigError::MissingSource {
        pool: pool.pool.pool_id.clone(),
        method: method.as_str(),
        source_kind,
    };

    let collector: Arc<dyn MetricsCollector> = match method {
        MonitoringMethod::Provider => {
            let monitoring = sources.monitoring.clone().ok_or_else(|| missing("monitoring"))?;
            Arc::new(MonitoringCollector::new(pool.pool.clone(), pool_api, monitoring))
        }
        MonitoringMethod::Scrape => {
            let scrape = sources.scrape.clone().ok_or_else(|| missing("scrape"))?;
            let endpoint = pool
                .monitoring
                .endpoint
                .clone()
                .filter(|e| !e.is_empty())
                .ok_or_else(|| ConfigError::MissingField {
                    pool: pool.pool.pool_id.clone(),
                    field: "monitoring.endpoint",
                })?;
            let mut collector = ScrapeCollector::new(pool.pool.clone(), pool_api, scrape, endpoint);
            if let Some(suffix) = &pool.monitoring.instance_suffix {
                collector = collector.with_instance_suffix(suffix.clone());
            }
            Arc::new(collector)
        }
    };

    debug!(pool = %pool.pool, method = method.as_str(), "metrics collector built");
    Ok(collector)
}
