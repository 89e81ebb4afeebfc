use foundation::time::Time;

/// Identifies one arming of a [`DebounceTimer`].
///
/// Re-arming issues a fresh handle; handles from earlier armings no longer
/// refer to anything.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Pending<T> {
    deadline: Time,
    payload: T,
}

/// Cancelable, re-armable single-slot timer.
///
/// Arming while already armed replaces the pending payload and pushes the
/// deadline out, so a burst of signals collapses into one firing carrying
/// the latest payload.
#[derive(Debug)]
pub struct DebounceTimer<T> {
    window_ms: u64,
    next_handle: u64,
    pending: Option<Pending<T>>,
}

impl<T> DebounceTimer<T> {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            next_handle: 1,
            pending: None,
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn arm(&mut self, payload: T, now: Time) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.pending = Some(Pending {
            deadline: now.plus_millis(self.window_ms),
            payload,
        });
        handle
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Time> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Disarms the timer, returning the payload that would have fired.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.payload)
    }

    /// True once `now` has reached the deadline of the pending arming.
    pub fn is_due(&self, now: Time) -> bool {
        self.pending.as_ref().is_some_and(|p| now >= p.deadline)
    }

    /// Takes the payload once `now` has reached the deadline.
    pub fn fire_due(&mut self, now: Time) -> Option<T> {
        if !self.is_due(now) {
            return None;
        }
        self.pending.take().map(|p| p.payload)
    }
}
