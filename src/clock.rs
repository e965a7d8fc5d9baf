//! Time source abstraction
//!
//! Everything that reads "now" goes through [`Clock`] so the ledger, the
//! eligibility policy and the scheduler can be driven by simulated time.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        debug!(%start, "ManualClock::new: called");
        Self { now: Mutex::new(start) }
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
        debug!(now = %*now, "ManualClock::advance: moved");
    }

    /// Jump the clock to `to`
    pub fn set(&self, to: DateTime<Utc>) {
        debug!(%to, "ManualClock::set: called");
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::hours(5));
        assert_eq!(clock.now(), start + Duration::hours(5));

        let later = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_system_clock_is_close_to_now() {
        let diff = Utc::now() - SystemClock.now();
        assert!(diff.num_seconds().abs() < 5);
    }
}
