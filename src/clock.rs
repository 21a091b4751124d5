//! Wall-clock source for attendance timestamps.
//!
//! Attendance dates are the subject's *local* calendar date at the moment of the
//! write, so the clock hands out timestamps carrying their UTC offset rather than
//! bare UTC instants.

use chrono::{DateTime, Duration, FixedOffset, Local};
use std::sync::Mutex;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time with the local UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Clock backed by the operating system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Manually driven clock for tests and replays.
///
/// # Example
///
/// ```
/// use gymgate::clock::{Clock, FixedClock};
/// use chrono::{DateTime, Duration};
///
/// let clock = FixedClock::new(DateTime::parse_from_rfc3339("2024-01-01T09:00:00Z").unwrap());
/// clock.advance(Duration::hours(8));
/// assert_eq!(clock.now().to_rfc3339(), "2024-01-01T17:00:00+00:00");
/// ```
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    /// Create a clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: DateTime<FixedOffset>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let next = self.now() + by;
        self.set(next);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_fixed_clock_set_and_advance() {
        let clock = FixedClock::new(at("2024-01-01T09:00:00Z"));
        assert_eq!(clock.now(), at("2024-01-01T09:00:00Z"));

        clock.advance(Duration::minutes(30));
        assert_eq!(clock.now(), at("2024-01-01T09:30:00Z"));

        clock.set(at("2024-02-01T07:15:00+02:00"));
        assert_eq!(clock.now().offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_system_clock_is_close_to_utc_now() {
        let now = SystemClock.now();
        let drift = (chrono::Utc::now() - now.with_timezone(&chrono::Utc))
            .num_seconds()
            .abs();
        assert!(drift < 5);
    }
}
