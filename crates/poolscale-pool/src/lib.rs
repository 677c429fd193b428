//! poolscale-pool: size control for one managed instance pool.
//!
//! The `InstancePoolController` is the only component that resizes a pool.
//! Both the threshold-driven decision loop and the schedule loop go
//! through it, and its per-pool mutex serializes every read-modify-resize
//! so the two can never race into a lost update.
//!
//! # Architecture
//!
//! ```text
//! InstancePoolController
//!   ├── PoolApi (external: status query + resize)
//!   ├── Mutex<tracked size>   ← held across read → check → resize
//!   ├── add_instances(n)      ← rejects size + n > limits.max
//!   ├── remove_instances(n)   ← rejects size - n < 0
//!   └── apply(action)         ← ±1, scale-down floored at limits.min
//! ```

pub mod controller;
pub mod error;

pub use controller::{InstancePoolController, ResizeOutcome};
pub use error::{PoolError, PoolResult};
