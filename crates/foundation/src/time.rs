/// Monotonic clock value in whole milliseconds.
///
/// The scheduler never reads the wall clock itself; callers pass `Time` in so
/// debouncing stays deterministic and replayable. Integer milliseconds keep
/// deadline comparisons exact.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(pub u64); // milliseconds

impl Time {
    pub const ZERO: Time = Time(0);

    pub fn from_millis(ms: u64) -> Self {
        Time(ms)
    }

    pub fn plus_millis(self, ms: u64) -> Self {
        Time(self.0.saturating_add(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::Time;

    #[test]
    fn millis_arithmetic() {
        let t = Time::from_millis(1500);
        assert_eq!(t.0, 1500);
        assert_eq!(t.plus_millis(150), Time(1650));
        assert!(Time::ZERO < t);
        assert_eq!(Time(u64::MAX).plus_millis(1), Time(u64::MAX));
    }

    #[test]
    fn window_end_is_exact() {
        // 0.12 s + 0.15 s is not 0.27 s in binary floating point.
        assert_eq!(Time::from_millis(120).plus_millis(150), Time::from_millis(270));
    }
}
