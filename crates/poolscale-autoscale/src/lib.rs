//! poolscale-autoscale: threshold-driven scaling for managed pools.
//!
//! `decision` is the pure rule engine. `PoolAutoscaler` runs it every
//! decision interval for one pool: collect metrics, read the size, decide,
//! apply through the pool controller, cool down after a resize.
//! `PoolSupervisor` owns every pool's decision and schedule loops.
//!
//! # Architecture
//!
//! ```text
//! PoolSupervisor
//!   └── per pool (one shutdown channel)
//!       ├── PoolAutoscaler (decision loop, default 5m)
//!       │     ├── MetricsCollector   → MetricsSnapshot
//!       │     ├── decide()           → Action + reason
//!       │     └── ActiveFlag         ← read-only view of the schedule
//!       ├── ScheduleWindowManager (schedule loop, default 60s)
//!       └── InstancePoolController (shared, per-pool mutex)
//! ```

pub mod autoscaler;
pub mod decision;
pub mod error;
pub mod supervisor;

pub use autoscaler::{CycleReport, PoolAutoscaler};
pub use decision::{Decision, DecisionReason, decide, evaluate};
pub use error::{AutoscaleError, AutoscaleResult};
pub use supervisor::PoolSupervisor;
