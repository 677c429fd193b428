//! poolscale-core: shared domain types for the poolscale autoscaler.
//!
//! Holds the data model every other crate speaks (limits, thresholds,
//! metrics snapshots, schedule windows, scaling actions), the `PoolApi`
//! contract through which the external compute service is reached, an
//! in-memory `PoolApi` for tests and dry runs, and the TOML configuration
//! layer.

pub mod api;
pub mod config;
pub mod error;
pub mod memory;
pub mod types;

pub use api::{PoolApi, PoolMember, PoolRef, PoolStatus};
pub use config::{
    AutoscalerConfig, MonitoringConfig, MonitoringMethod, PoolConfig, ScheduleEntry, Timing,
    TimingConfig, ValidatedPool,
};
pub use error::{ConfigError, ConfigResult};
pub use memory::MemoryPool;
pub use types::*;
