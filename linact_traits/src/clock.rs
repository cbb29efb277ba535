//! Time source for pacing bridge exchanges.
//!
//! Every wait between a write and its read-back goes through `Clock::sleep`,
//! so tests can swap in `TestClock` and run thousands of control ticks
//! without real delays.
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
    /// Best-effort wait; the control period is advisory.
    fn sleep(&self, d: Duration);

    /// Whole microseconds since `since`; 0 if `since` lies in the future.
    fn micros_since(&self, since: Instant) -> u64 {
        let us = self.now().saturating_duration_since(since).as_micros();
        u64::try_from(us).unwrap_or(u64::MAX)
    }
}

/// Wall-clock pacing via `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub const fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::{Duration, Instant};

    use super::Clock;

    /// Virtual time: `sleep` returns at once and moves the clock forward.
    /// Clones share one timeline, so a test can keep a handle while the
    /// controller owns another.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        start: Instant,
        slept: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                start: Instant::now(),
                slept: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        pub fn advance(&self, d: Duration) {
            let mut slept = self.slept.lock().unwrap_or_else(PoisonError::into_inner);
            *slept = slept.saturating_add(d);
        }

        /// Virtual time passed since construction.
        pub fn elapsed(&self) -> Duration {
            *self.slept.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.start + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_clock::TestClock;
    use super::*;

    #[test]
    fn virtual_sleep_accumulates_control_periods() {
        let clock = TestClock::new();
        let t0 = clock.now();
        for _ in 0..3 {
            clock.sleep(Duration::from_micros(1200));
        }
        assert_eq!(clock.micros_since(t0), 3600);
        assert_eq!(clock.elapsed(), Duration::from_micros(3600));
    }

    #[test]
    fn clones_share_one_timeline() {
        let a = TestClock::new();
        let b = a.clone();
        b.advance(Duration::from_millis(500));
        assert_eq!(a.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn zero_sleep_does_not_block() {
        let clock = MonotonicClock::new();
        let t0 = clock.now();
        clock.sleep(Duration::ZERO);
        assert!(clock.micros_since(t0) < 1_000_000);
    }
}
