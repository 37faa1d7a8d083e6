//! Deadline bookkeeping for the drain loop.
//!
//! The budget is recomputed before every wait as
//! `timeout - (now - start)`. A clock reading earlier than the start is
//! treated as an exhausted budget: elapsed time is unknown at that point and
//! a spurious timeout is preferred over an unbounded hang.

use std::time::{Duration, Instant};
use tracing::warn;

/// Source of timestamps, as offsets from an arbitrary fixed origin.
pub(crate) trait Clock {
    fn now(&self) -> Duration;
}

/// Monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// How long the next wait may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Budget {
    /// No timeout was requested.
    Unbounded,
    /// Time left before the deadline. Never zero.
    Remaining(Duration),
    /// The deadline has passed, or the clock cannot be trusted.
    Expired,
}

/// A timeout anchored at the moment it was started.
#[derive(Debug)]
pub(crate) struct Deadline<C: Clock = MonotonicClock> {
    timeout: Option<Duration>,
    start: Duration,
    clock: C,
}

#[cfg(test)]
impl Deadline<MonotonicClock> {
    pub(crate) fn start(timeout: Option<Duration>) -> Self {
        Self::start_with_clock(timeout, MonotonicClock::new())
    }
}

impl<C: Clock> Deadline<C> {
    /// Record the start timestamp. Called once, before the first wait.
    pub(crate) fn start_with_clock(timeout: Option<Duration>, clock: C) -> Self {
        let start = clock.now();
        Self {
            timeout,
            start,
            clock,
        }
    }

    pub(crate) fn remaining(&self) -> Budget {
        let Some(timeout) = self.timeout else {
            return Budget::Unbounded;
        };

        let now = self.clock.now();
        let Some(elapsed) = now.checked_sub(self.start) else {
            warn!(
                start = ?self.start,
                now = ?now,
                "clock moved backwards, treating deadline as expired"
            );
            return Budget::Expired;
        };

        match timeout.checked_sub(elapsed) {
            Some(left) if !left.is_zero() => Budget::Remaining(left),
            _ => Budget::Expired,
        }
    }
}

/// Hand-driven clock for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ManualClock {
    now: std::cell::Cell<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn at(now: Duration) -> Self {
        Self {
            now: std::cell::Cell::new(now),
        }
    }

    pub(crate) fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

#[cfg(test)]
impl Clock for &ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_no_timeout_is_unbounded() {
        let clock = ManualClock::at(secs(100));
        let deadline = Deadline::start_with_clock(None, &clock);
        clock.set(secs(100_000));
        assert_eq!(deadline.remaining(), Budget::Unbounded);
    }

    #[test]
    fn test_budget_shrinks() {
        let clock = ManualClock::at(secs(10));
        let deadline = Deadline::start_with_clock(Some(secs(5)), &clock);
        assert_eq!(deadline.remaining(), Budget::Remaining(secs(5)));

        clock.set(secs(12));
        assert_eq!(deadline.remaining(), Budget::Remaining(secs(3)));

        clock.set(Duration::from_millis(14_999));
        assert_eq!(
            deadline.remaining(),
            Budget::Remaining(Duration::from_millis(1))
        );
    }

    #[test]
    fn test_expires_exactly_at_timeout() {
        let clock = ManualClock::at(secs(10));
        let deadline = Deadline::start_with_clock(Some(secs(5)), &clock);
        clock.set(secs(15));
        assert_eq!(deadline.remaining(), Budget::Expired);

        clock.set(secs(60));
        assert_eq!(deadline.remaining(), Budget::Expired);
    }

    #[test]
    fn test_backwards_clock_expires() {
        let clock = ManualClock::at(secs(10));
        let deadline = Deadline::start_with_clock(Some(secs(3600)), &clock);
        clock.set(secs(9));
        assert_eq!(deadline.remaining(), Budget::Expired);
    }

    #[test]
    fn test_backwards_clock_ignored_without_timeout() {
        let clock = ManualClock::at(secs(10));
        let deadline = Deadline::start_with_clock(None, &clock);
        clock.set(secs(1));
        assert_eq!(deadline.remaining(), Budget::Unbounded);
    }

    #[test]
    fn test_monotonic_clock_counts_up() {
        let deadline = Deadline::start(Some(secs(60)));
        match deadline.remaining() {
            Budget::Remaining(left) => assert!(left <= secs(60) && left > secs(50)),
            other => panic!("unexpected budget {:?}", other),
        }
    }
}
