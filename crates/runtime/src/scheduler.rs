use std::sync::Arc;

use foundation::time::Time;
use tracing::debug;

use crate::guard::{RecomputeGuard, RecomputePermit};
use crate::timer::{DebounceTimer, TimerHandle};

/// Default debounce window for viewport-change signals.
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    /// Signals received.
    pub signals: u64,
    /// Signals that replaced a still-pending one.
    pub coalesced: u64,
    /// Due runs started.
    pub started: u64,
    /// Due runs dropped because another run held the guard.
    pub dropped_busy: u64,
}

/// A due recompute: the latest payload plus the permit that serializes it.
#[derive(Debug)]
pub struct ScheduledRun<T> {
    pub payload: T,
    pub permit: RecomputePermit,
}

/// Debounced, reentrancy-guarded trigger for recomputation.
///
/// Driven by explicit `Time` values:
/// - `signal` (re)arms the debounce timer with the newest payload.
/// - `poll` hands out the payload once the window has elapsed, but only if no
///   other run is in flight; a busy guard drops the run rather than queueing it.
#[derive(Debug)]
pub struct RecomputeScheduler<T> {
    timer: DebounceTimer<T>,
    guard: Arc<RecomputeGuard>,
    stats: SchedulerStats,
}

impl<T> RecomputeScheduler<T> {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            timer: DebounceTimer::new(debounce_ms),
            guard: RecomputeGuard::new(),
            stats: SchedulerStats::default(),
        }
    }

    pub fn guard(&self) -> Arc<RecomputeGuard> {
        Arc::clone(&self.guard)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn deadline(&self) -> Option<Time> {
        self.timer.deadline()
    }

    pub fn signal(&mut self, payload: T, now: Time) -> TimerHandle {
        self.stats.signals += 1;
        if self.timer.is_armed() {
            self.stats.coalesced += 1;
        }
        self.guard.note_request();
        self.timer.arm(payload, now)
    }

    /// Drops any pending run without executing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.timer.cancel()
    }

    pub fn poll(&mut self, now: Time) -> Option<ScheduledRun<T>> {
        if !self.timer.is_due(now) {
            return None;
        }
        let Some(permit) = self.guard.try_begin() else {
            // Leave nothing pending: the next signal re-arms and catches up.
            self.timer.cancel();
            self.stats.dropped_busy += 1;
            debug!("recompute already in flight; dropping due run");
            return None;
        };
        let payload = self.timer.fire_due(now)?;
        self.stats.started += 1;
        Some(ScheduledRun { payload, permit })
    }
}
