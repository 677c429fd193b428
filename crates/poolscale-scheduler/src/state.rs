//! Schedule state and the cross-task active flag.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether a window currently governs the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Inactive,
    /// Index into the manager's window list.
    Active { window: usize },
}

/// State of one activation cycle.
///
/// `scaled_up` and `scaled_down` are only ever reset together with the
/// transition back to `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerState {
    pub phase: Phase,
    pub scaled_up: bool,
    pub scaled_down: bool,
}

impl SchedulerState {
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active { .. })
    }

    pub fn active_window(&self) -> Option<usize> {
        match self.phase {
            Phase::Active { window } => Some(window),
            Phase::Inactive => None,
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase {
            Phase::Inactive => write!(f, "inactive"),
            Phase::Active { window } => write!(
                f,
                "active(window {window}, scaled_up={}, scaled_down={})",
                self.scaled_up, self.scaled_down
            ),
        }
    }
}

/// Lock-free view of whether the schedule is active.
///
/// Written by the schedule loop, read by the decision loop. Readers may
/// see a value one tick stale.
#[derive(Debug, Clone, Default)]
pub struct ActiveFlag(Arc<AtomicBool>);

impl ActiveFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn set(&self, active: bool) {
        self.0.store(active, Ordering::Relaxed);
    }
}
