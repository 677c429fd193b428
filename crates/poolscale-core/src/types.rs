//! Domain types shared by the collector, controller, scheduler, and
//! decision engine.

use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Identifier of a managed instance pool (provider OCID or similar).
pub type PoolId = String;

// ── Limits & thresholds ────────────────────────────────────────────

/// Hard bounds on the pool size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    pub min: u32,
    pub max: u32,
}

impl PoolLimits {
    /// Whether `size` lies inside `[min, max]`.
    pub fn contains(&self, size: u32) -> bool {
        size >= self.min && size <= self.max
    }
}

/// Lower and upper utilization bounds for one resource, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceThreshold {
    pub min: f64,
    pub max: f64,
}

impl ResourceThreshold {
    /// A band with `min >= max` makes the pool oscillate between
    /// scale-up and scale-down.
    pub fn is_well_formed(&self) -> bool {
        self.min < self.max
    }
}

/// Per-resource utilization bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub cpu: ResourceThreshold,
    pub ram: ResourceThreshold,
}

impl fmt::Display for Thresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpu {:.1}..{:.1}%, ram {:.1}..{:.1}%",
            self.cpu.min, self.cpu.max, self.ram.min, self.ram.max
        )
    }
}

// ── Metrics ────────────────────────────────────────────────────────

/// Pool-wide average utilization, in percent.
///
/// A negative (or NaN) component marks an invalid read. An exact `(0, 0)` means the
/// collector had no data; a genuine all-zero reading cannot be told apart
/// and is treated the same way.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub avg_cpu: f64,
    pub avg_ram: f64,
}

impl MetricsSnapshot {
    /// Sentinel for a read that could not be interpreted.
    pub const INVALID: MetricsSnapshot = MetricsSnapshot {
        avg_cpu: -1.0,
        avg_ram: -1.0,
    };

    pub fn new(avg_cpu: f64, avg_ram: f64) -> Self {
        Self { avg_cpu, avg_ram }
    }

    /// Negative or NaN in either component.
    pub fn is_invalid(&self) -> bool {
        [self.avg_cpu, self.avg_ram]
            .iter()
            .any(|v| v.is_nan() || *v < 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.avg_cpu == 0.0 && self.avg_ram == 0.0
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu {:.2}%, ram {:.2}%", self.avg_cpu, self.avg_ram)
    }
}

// ── Schedule windows ───────────────────────────────────────────────

/// A daily wall-clock window during which the pool is pre-scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Instances added on entry and removed after the window ends.
    pub target_instances: u32,
}

impl ScheduleWindow {
    /// Whether `now` falls inside the window, both ends inclusive.
    ///
    /// A window whose start is later than its end wraps past midnight.
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start_time <= self.end_time {
            self.start_time <= now && now <= self.end_time
        } else {
            now >= self.start_time || now <= self.end_time
        }
    }
}

impl fmt::Display for ScheduleWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} (+{})",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M"),
            self.target_instances
        )
    }
}

// ── Actions ────────────────────────────────────────────────────────

/// What the decision engine wants done to the pool.
///
/// Carries no magnitude: threshold-driven scaling always moves by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ScaleUp,
    ScaleDown,
    NoAction,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::ScaleUp => "scale-up",
            Action::ScaleDown => "scale-down",
            Action::NoAction => "no-action",
        };
        f.write_str(s)
    }
}
