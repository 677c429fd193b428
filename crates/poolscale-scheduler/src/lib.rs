//! poolscale-scheduler: time-window capacity for a managed pool.
//!
//! A `ScheduleWindowManager` ticks against the wall clock. When a configured
//! window opens it adds the window's target instances once; after the window
//! closes it removes them once. While a window is active the decision loop
//! reads the shared `ActiveFlag` and holds off on load-driven scale-down.
//!
//! # Architecture
//!
//! ```text
//! ScheduleWindowManager (one per pool, owns SchedulerState)
//!   ├── windows: Vec<ScheduleWindow>   ← first match in config order wins
//!   ├── InstancePoolController         ← shared with the decision loop
//!   └── ActiveFlag (relaxed atomic)    ← read by the decision loop
//!
//! Inactive ──window matches──▶ Active{window} ── add target (once)
//!    ▲                              │
//!    └── no match, nothing pending ◀┘ ── window ended: remove target (once)
//! ```

pub mod state;
pub mod window_manager;

pub use state::{ActiveFlag, Phase, SchedulerState};
pub use window_manager::{MAX_FAILED_RELEASES, ScheduleWindowManager};
