//! poolscale-metrics: utilization snapshots for a managed pool.
//!
//! A `MetricsCollector` turns the pool's current membership into one
//! pool-wide `MetricsSnapshot` (average CPU and memory utilization). Two
//! collectors ship here; both enumerate members through `PoolApi` and
//! differ only in where per-instance readings come from.
//!
//! # Architecture
//!
//! ```text
//! MetricsCollector (trait)
//!   ├── MonitoringCollector ← MonitoringApi: 5m max-aggregated windows,
//!   │                         missing datapoints count as 0
//!   └── ScrapeCollector     ← ScrapeApi: instant PromQL queries,
//!                             any missing series fails the collection
//!
//! build_collector() picks one from the pool's `[monitoring]` config.
//! ```

pub mod collector;
pub mod error;
pub mod factory;
pub mod monitoring;
pub mod prometheus;
pub mod scrape;

pub use collector::MetricsCollector;
pub use error::{MetricsError, MetricsResult};
pub use factory::{MetricSources, build_collector};
pub use monitoring::{
    Aggregation, Datapoint, MonitoringApi, MonitoringCollector, MonitoringQuery, ResourceMetric,
};
pub use prometheus::{cpu_utilization_query, memory_utilization_query, parse_vector_response};
pub use scrape::{Sample, ScrapeApi, ScrapeCollector};
