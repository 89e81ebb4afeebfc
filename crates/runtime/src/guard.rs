use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Reentrancy guard for recomputation.
///
/// At most one [`RecomputePermit`] exists at a time. A second `try_begin`
/// while a permit is alive fails instead of queueing; the next request will
/// retry naturally. Every request bumps a generation counter so a finished
/// run can tell whether a newer request arrived while it was working.
#[derive(Debug, Default)]
pub struct RecomputeGuard {
    busy: AtomicBool,
    latest_request: AtomicU64,
}

impl RecomputeGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records a new request and returns its generation.
    pub fn note_request(&self) -> u64 {
        self.latest_request.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn latest_request(&self) -> u64 {
        self.latest_request.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn try_begin(self: &Arc<Self>) -> Option<RecomputePermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(RecomputePermit {
            guard: Arc::clone(self),
            generation: self.latest_request(),
        })
    }
}

/// Exclusive right to run one recompute. Released on drop.
#[derive(Debug)]
pub struct RecomputePermit {
    guard: Arc<RecomputeGuard>,
    generation: u64,
}

impl RecomputePermit {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a request newer than the one this run serves has been noted.
    pub fn is_stale(&self) -> bool {
        self.guard.latest_request() > self.generation
    }
}

impl Drop for RecomputePermit {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::RecomputeGuard;

    #[test]
    fn second_begin_is_dropped_while_busy() {
        let guard = RecomputeGuard::new();
        let permit = guard.try_begin().expect("first permit");
        assert!(guard.is_busy());
        assert!(guard.try_begin().is_none());
        drop(permit);
        assert!(!guard.is_busy());
        assert!(guard.try_begin().is_some());
    }

    #[test]
    fn newer_request_marks_run_stale() {
        let guard = RecomputeGuard::new();
        guard.note_request();
        let permit = guard.try_begin().unwrap();
        assert_eq!(permit.generation(), 1);
        assert!(!permit.is_stale());
        guard.note_request();
        assert!(permit.is_stale());
    }
}
