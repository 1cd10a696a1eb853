//! Attempt clock
//!
//! Remaining time is always derived from the fixed start timestamp and the
//! attempt duration, never accumulated tick by tick, so it survives process
//! restarts and is immune to tick cadence. The computation is a pure function;
//! the 1-second scheduling lives in its own restartable [`SecondTicker`].

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Derived clock snapshot for a running attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemainingTime {
    pub minutes: u32,
    pub seconds: u32,
    pub remaining_ms: u64,
}

impl RemainingTime {
    pub const ZERO: Self = Self {
        minutes: 0,
        seconds: 0,
        remaining_ms: 0,
    };

    pub fn is_expired(&self) -> bool {
        self.remaining_ms == 0
    }
}

/// Compute the time left in an attempt.
///
/// Returns zero when the attempt has no start timestamp or a non-positive
/// duration; callers distinguish "timer inactive" from "time expired" via the
/// attempt's `active` flag. Saturates at zero and never goes negative; a
/// `now_ms` before the start timestamp counts as zero elapsed.
pub fn remaining(now_ms: i64, started_at_ms: Option<i64>, duration_minutes: u32) -> RemainingTime {
    let Some(started_at_ms) = started_at_ms else {
        return RemainingTime::ZERO;
    };
    if duration_minutes == 0 {
        return RemainingTime::ZERO;
    }

    let total_ms = duration_minutes as u64 * 60_000;
    let elapsed_ms = now_ms.saturating_sub(started_at_ms).max(0) as u64;
    let remaining_ms = total_ms.saturating_sub(elapsed_ms);

    RemainingTime {
        minutes: (remaining_ms / 60_000) as u32,
        seconds: ((remaining_ms % 60_000) / 1_000) as u32,
        remaining_ms,
    }
}

// ============================================================================
// Tick Source
// ============================================================================

/// Restartable 1-second tick source.
///
/// `start` replaces any previous tick task, so a stale interval can never keep
/// running after the governing attempt becomes invalid and is restarted later.
/// Dropping the ticker stops it.
#[derive(Default)]
pub struct SecondTicker {
    task: Option<JoinHandle<()>>,
}

impl SecondTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking, invoking `on_tick` once per second.
    pub fn start<F>(&mut self, mut on_tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first interval tick fires immediately; the callback cadence
            // starts one second in.
            interval.tick().await;
            loop {
                interval.tick().await;
                on_tick();
            }
        }));
    }

    /// Stop ticking. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SecondTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Tests
// ============================================================================
