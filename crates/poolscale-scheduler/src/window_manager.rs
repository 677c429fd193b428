//! Schedule window manager: time-of-day driven pool capacity.
//!
//! Each tick compares the wall clock against the configured windows. The
//! first window in configuration order that contains the current time is
//! the one that activates. Entering a window adds its target once; the
//! first tick after the active window ends removes the target once; the
//! tick after that returns to `Inactive` and clears both flags. A release
//! that keeps failing holds the phase for at most `MAX_FAILED_RELEASES`
//! ticks past the window's end.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use poolscale_core::ScheduleWindow;
use poolscale_pool::{InstancePoolController, PoolError, ResizeOutcome};

use crate::state::{ActiveFlag, Phase, SchedulerState};

/// Failed end-of-window release attempts before the window is dropped.
pub const MAX_FAILED_RELEASES: u32 = 5;

/// Drives one pool's schedule windows.
pub struct ScheduleWindowManager {
    controller: Arc<InstancePoolController>,
    windows: Vec<ScheduleWindow>,
    tick: Duration,
    state: SchedulerState,
    active: ActiveFlag,
    failed_releases: u32,
}

impl ScheduleWindowManager {
    /// Create a manager in the `Inactive` phase.
    ///
    /// Scale-up stops at the controller's `limits.max`.
    pub fn new(
        controller: Arc<InstancePoolController>,
        windows: Vec<ScheduleWindow>,
        tick: Duration,
    ) -> Self {
        Self {
            controller,
            windows,
            tick,
            state: SchedulerState::default(),
            active: ActiveFlag::new(),
            failed_releases: 0,
        }
    }

    /// A handle the decision loop can poll without locking.
    pub fn active_flag(&self) -> ActiveFlag {
        self.active.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_active()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn windows(&self) -> &[ScheduleWindow] {
        &self.windows
    }

    /// Index of the first window containing `now`.
    pub fn matching_window(&self, now: NaiveTime) -> Option<usize> {
        self.windows.iter().position(|w| w.contains(now))
    }

    /// Run one tick at wall-clock time `now` and return the resulting state.
    pub async fn tick_at(&mut self, now: NaiveTime) -> SchedulerState {
        if let Phase::Active { window } = self.state.phase {
            if self.windows[window].contains(now) {
                self.ensure_scaled_up(window).await;
                return self.state;
            }
            if !self.state.scaled_down && self.release(window).await {
                return self.state;
            }
            self.deactivate(window);
        }

        if let Some(window) = self.matching_window(now) {
            self.activate(window);
            self.ensure_scaled_up(window).await;
        }
        self.state
    }

    /// Tick on local time until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let pool = self.controller.pool().clone();
        info!(
            %pool,
            windows = self.windows.len(),
            tick_secs = self.tick.as_secs(),
            "schedule loop started"
        );

        loop {
            let state = self.tick_at(chrono::Local::now().time()).await;
            debug!(%pool, %state, "schedule tick");

            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {}
                _ = shutdown.changed() => {
                    info!(%pool, "schedule loop shutting down");
                    break;
                }
            }
        }
        self.active.set(false);
    }

    fn activate(&mut self, window: usize) {
        self.state = SchedulerState {
            phase: Phase::Active { window },
            scaled_up: false,
            scaled_down: false,
        };
        self.failed_releases = 0;
        self.active.set(true);
        info!(
            pool = %self.controller.pool(),
            window = %self.windows[window],
            "schedule window active"
        );
    }

    fn deactivate(&mut self, window: usize) {
        self.state = SchedulerState::default();
        self.failed_releases = 0;
        self.active.set(false);
        info!(
            pool = %self.controller.pool(),
            window = %self.windows[window],
            "schedule window inactive"
        );
    }

    /// Add the window's target once per activation, while below the cap.
    async fn ensure_scaled_up(&mut self, window: usize) {
        if self.state.scaled_up {
            return;
        }
        let pool = self.controller.pool().clone();
        let cap = self.controller.limits().max;
        let target = self.windows[window].target_instances;

        let size = match self.controller.current_size().await {
            Ok(size) => size,
            Err(e) => {
                warn!(%pool, error = %e, "schedule tick skipped: pool size unavailable");
                return;
            }
        };
        if size >= cap {
            debug!(%pool, size, cap, "pool at cap, schedule scale-up not attempted");
            return;
        }

        match self.controller.add_instances(target).await {
            Ok(ResizeOutcome::Resized { from, to }) => {
                info!(%pool, from, to, target, "schedule scale-up applied");
                self.state.scaled_up = true;
            }
            Ok(outcome) => {
                warn!(%pool, ?outcome, target, "schedule scale-up not applied");
                self.state.scaled_up = true;
            }
            Err(e) => log_failure(&pool, "scale-up", &e),
        }
    }

    /// Remove the ended window's target once, if the pool is above it.
    ///
    /// Returns whether the phase stays `Active` until the next tick: the
    /// scale-down was handled this tick, or it failed and will be retried.
    async fn release(&mut self, window: usize) -> bool {
        let pool = self.controller.pool().clone();
        let target = self.windows[window].target_instances;

        let size = match self.controller.current_size().await {
            Ok(size) => size,
            Err(e) => {
                warn!(%pool, error = %e, "schedule tick skipped: pool size unavailable");
                return self.hold_after_failure(window);
            }
        };
        if size <= target {
            return false;
        }

        match self.controller.remove_instances(target).await {
            Ok(ResizeOutcome::Resized { from, to }) => {
                info!(%pool, from, to, target, "schedule scale-down applied");
                self.state.scaled_down = true;
            }
            Ok(outcome) => {
                warn!(%pool, ?outcome, target, "schedule scale-down not applied");
                self.state.scaled_down = true;
            }
            Err(e) => {
                log_failure(&pool, "scale-down", &e);
                return self.hold_after_failure(window);
            }
        }
        true
    }

    /// Count a failed release; `false` once the window has been held too long.
    fn hold_after_failure(&mut self, window: usize) -> bool {
        self.failed_releases += 1;
        let pool = self.controller.pool();
        if self.failed_releases >= MAX_FAILED_RELEASES {
            error!(
                %pool,
                window = %self.windows[window],
                attempts = self.failed_releases,
                "giving up end-of-window scale-down"
            );
            return false;
        }
        warn!(
            %pool,
            window = %self.windows[window],
            attempts = self.failed_releases,
            "schedule phase held past window end"
        );
        true
    }
}

fn log_failure(pool: &poolscale_core::PoolRef, step: &str, e: &PoolError) {
    match e {
        PoolError::Status { .. } => warn!(%pool, step, error = %e, "schedule step skipped"),
        PoolError::Resize { .. } => error!(%pool, step, error = %e, "schedule step failed"),
    }
}
