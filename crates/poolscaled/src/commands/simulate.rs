use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use poolscale_autoscale::PoolSupervisor;
use poolscale_core::{AutoscalerConfig, MemoryPool, PoolApi, PoolRef, PoolStatus};
use poolscale_metrics::{
    Datapoint, MetricSources, MonitoringApi, MonitoringQuery, ResourceMetric, Sample, ScrapeApi,
};

/// One in-memory pool per configured pool ID.
struct SimulatedFleet(HashMap<String, MemoryPool>);

impl SimulatedFleet {
    fn new(config: &AutoscalerConfig, size: u32) -> Self {
        Self(
            config
                .pools
                .iter()
                .map(|p| (p.pool_id.clone(), MemoryPool::new(size)))
                .collect(),
        )
    }

    fn pool(&self, pool: &PoolRef) -> anyhow::Result<&MemoryPool> {
        self.0
            .get(&pool.pool_id)
            .ok_or_else(|| anyhow::anyhow!("pool {pool} is not simulated"))
    }

    fn sizes(&self) -> BTreeMap<&str, u32> {
        self.0.iter().map(|(id, p)| (id.as_str(), p.size())).collect()
    }
}

#[async_trait]
impl PoolApi for SimulatedFleet {
    async fn pool_status(&self, pool: &PoolRef) -> anyhow::Result<PoolStatus> {
        self.pool(pool)?.pool_status(pool).await
    }

    async fn resize(&self, pool: &PoolRef, size: u32) -> anyhow::Result<()> {
        self.pool(pool)?.resize(pool, size).await
    }
}

/// Every instance reports the same utilization, whatever the source.
#[derive(Clone, Copy)]
struct ConstantLoad {
    cpu: f64,
    ram: f64,
}

#[async_trait]
impl MonitoringApi for ConstantLoad {
    async fn summarize(&self, query: &MonitoringQuery) -> anyhow::Result<Vec<Datapoint>> {
        let value = match query.metric {
            ResourceMetric::Cpu => self.cpu,
            ResourceMetric::Memory => self.ram,
        };
        Ok(vec![Datapoint {
            timestamp: query.end_time,
            value,
        }])
    }
}

#[async_trait]
impl ScrapeApi for ConstantLoad {
    async fn instant_query(&self, _endpoint: &str, expr: &str) -> anyhow::Result<Vec<Sample>> {
        let value = if expr.contains("node_cpu_seconds_total") {
            self.cpu
        } else {
            self.ram
        };
        Ok(vec![Sample {
            labels: BTreeMap::new(),
            value,
        }])
    }
}

/// Run the supervisor against in-memory pools until Ctrl-C or `duration`.
pub async fn simulate(
    config: &AutoscalerConfig,
    cpu: f64,
    ram: f64,
    size: u32,
    duration: Option<Duration>,
) -> anyhow::Result<()> {
    let timing = config.timing.parse()?;
    let fleet = Arc::new(SimulatedFleet::new(config, size));
    let load = Arc::new(ConstantLoad { cpu, ram });
    let sources = MetricSources::default()
        .with_monitoring(load.clone())
        .with_scrape(load);

    let supervisor = PoolSupervisor::new(fleet.clone(), sources, timing);
    let failed = supervisor.start_all(config).await;
    for (pool_id, error) in &failed {
        eprintln!("✗ {pool_id}: {error}");
    }

    info!(cpu, ram, size, "simulation running");
    match duration {
        Some(d) => tokio::time::sleep(d).await,
        None => {
            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");
        }
    }
    supervisor.stop_all().await;

    println!("final pool sizes:");
    for (pool_id, size) in fleet.sizes() {
        println!("  {pool_id}: {size}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[timing]
decision_interval = "10s"
cooldown = "10s"

[[pools]]
pool_id = "pool-a"
compartment_id = "compartment-1"
region = "eu-frankfurt-1"
[pools.monitoring]
method = "scrape"
endpoint = "http://prometheus:9090"
[pools.thresholds]
cpu = { min = 20.0, max = 80.0 }
ram = { min = 20.0, max = 80.0 }
[pools.limits]
min = 1
max = 4
"#;

    #[tokio::test(start_paused = true)]
    async fn fleet_grows_to_max_under_load() {
        let config = AutoscalerConfig::from_toml_str(CONFIG).unwrap();
        let fleet = Arc::new(SimulatedFleet::new(&config, 1));
        let load = Arc::new(ConstantLoad { cpu: 95.0, ram: 50.0 });
        let sources = MetricSources::default().with_scrape(load);
        let supervisor =
            PoolSupervisor::new(fleet.clone(), sources, config.timing.parse().unwrap());

        assert!(supervisor.start_all(&config).await.is_empty());
        tokio::time::sleep(Duration::from_secs(300)).await;
        supervisor.stop_all().await;

        assert_eq!(fleet.sizes().get("pool-a"), Some(&4));
    }

    #[tokio::test]
    async fn unknown_pool_is_an_error() {
        let fleet = SimulatedFleet(HashMap::new());
        let pool = PoolRef::new("pool-z", "compartment-1", "eu-frankfurt-1");
        assert!(fleet.pool_status(&pool).await.is_err());
    }
}
