//! Scaling decision engine.
//!
//! Pure function of the snapshot, thresholds, limits, current size, and
//! whether a schedule window is active. Rules are checked in order and the
//! first one that matches decides:
//!
//! 1. invalid reading (negative component)      → no action
//! 2. no data (`0, 0`)                          → no action
//! 3. size below `limits.min`                   → scale up
//! 4. size above `limits.max`                   → scale down
//! 5. cpu or ram above its max threshold        → scale up
//! 6. cpu or ram below its min threshold        → scale down, or no action
//!    while a schedule window is active
//! 7. otherwise                                 → no action

use std::fmt;

use serde::Serialize;

use poolscale_core::{Action, MetricsSnapshot, PoolLimits, Thresholds};

/// The rule that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    InvalidReading,
    NoData,
    BelowMinimum,
    AboveMaximum,
    LoadHigh,
    LoadLow,
    /// Load is low but a schedule window holds the capacity.
    LoadLowDeferred,
    WithinThresholds,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionReason::InvalidReading => "invalid metric reading",
            DecisionReason::NoData => "no metric data",
            DecisionReason::BelowMinimum => "pool below minimum size",
            DecisionReason::AboveMaximum => "pool above maximum size",
            DecisionReason::LoadHigh => "utilization above threshold",
            DecisionReason::LoadLow => "utilization below threshold",
            DecisionReason::LoadLowDeferred => "utilization below threshold, schedule active",
            DecisionReason::WithinThresholds => "utilization within thresholds",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub reason: DecisionReason,
}

impl Decision {
    fn new(action: Action, reason: DecisionReason) -> Self {
        Self { action, reason }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.action, self.reason)
    }
}

/// Decide what to do with the pool, and why.
pub fn decide(
    metrics: &MetricsSnapshot,
    thresholds: &Thresholds,
    limits: PoolLimits,
    current_size: u32,
    scheduler_active: bool,
) -> Decision {
    use DecisionReason::*;

    if metrics.is_invalid() {
        return Decision::new(Action::NoAction, InvalidReading);
    }
    if metrics.is_empty() {
        return Decision::new(Action::NoAction, NoData);
    }

    if current_size < limits.min {
        return Decision::new(Action::ScaleUp, BelowMinimum);
    }
    if current_size > limits.max {
        return Decision::new(Action::ScaleDown, AboveMaximum);
    }

    let (cpu, ram) = (metrics.avg_cpu, metrics.avg_ram);
    if cpu > thresholds.cpu.max || ram > thresholds.ram.max {
        return Decision::new(Action::ScaleUp, LoadHigh);
    }
    if cpu < thresholds.cpu.min || ram < thresholds.ram.min {
        return if scheduler_active {
            Decision::new(Action::NoAction, LoadLowDeferred)
        } else {
            Decision::new(Action::ScaleDown, LoadLow)
        };
    }

    Decision::new(Action::NoAction, WithinThresholds)
}

/// The action `decide` would take.
pub fn evaluate(
    metrics: &MetricsSnapshot,
    thresholds: &Thresholds,
    limits: PoolLimits,
    current_size: u32,
    scheduler_active: bool,
) -> Action {
    decide(metrics, thresholds, limits, current_size, scheduler_active).action
}
