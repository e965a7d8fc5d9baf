//! Eligibility policy
//!
//! Two independent limits gate every attempt: a cap on actions per calendar
//! day and a minimum spacing between consecutive actions. Both are read from
//! the ledger on each check; nothing is cached.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::config::PolicyConfig;
use crate::ledger::{Ledger, LedgerError};

/// Outcome of an eligibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,

    /// Today's count has reached the daily cap
    DailyCapReached { count: u32, max: u32 },

    /// The last action was less than the minimum interval ago
    TooSoon {
        elapsed: Duration,
        next_allowed_at: DateTime<Utc>,
    },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

impl std::fmt::Display for Eligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eligible => write!(f, "eligible"),
            Self::DailyCapReached { count, max } => write!(f, "daily limit reached ({}/{})", count, max),
            Self::TooSoon { next_allowed_at, .. } => {
                write!(f, "waiting for interval (next at {})", next_allowed_at.format("%Y-%m-%d %H:%M:%S UTC"))
            }
        }
    }
}

/// Daily cap plus minimum spacing
pub struct EligibilityPolicy {
    max_actions_per_day: u32,
    min_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl EligibilityPolicy {
    pub fn new(max_actions_per_day: u32, min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        debug!(max_actions_per_day, ?min_interval, "EligibilityPolicy::new: called");
        Self {
            max_actions_per_day,
            min_interval,
            clock,
        }
    }

    pub fn from_config(config: &PolicyConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.max_actions_per_day, config.min_interval(), clock)
    }

    pub fn max_actions_per_day(&self) -> u32 {
        self.max_actions_per_day
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether today's count is still below the cap
    pub fn can_act_today(&self, ledger: &Ledger) -> Result<bool, LedgerError> {
        Ok(ledger.count_today()? < self.max_actions_per_day)
    }

    /// Whether enough time has passed since the last action
    pub fn can_act_now(&self, ledger: &Ledger) -> Result<bool, LedgerError> {
        Ok(match ledger.last_action_time()? {
            None => true,
            Some(last) => self.clock.now() - last >= self.min_interval,
        })
    }

    pub fn is_eligible(&self, ledger: &Ledger) -> Result<bool, LedgerError> {
        Ok(self.can_act_today(ledger)? && self.can_act_now(ledger)?)
    }

    /// Evaluate both limits and report which one blocks, daily cap first
    pub fn check(&self, ledger: &Ledger) -> Result<Eligibility, LedgerError> {
        debug!("EligibilityPolicy::check: called");
        let count = ledger.count_today()?;
        if count >= self.max_actions_per_day {
            debug!(count, max = self.max_actions_per_day, "EligibilityPolicy::check: daily cap");
            return Ok(Eligibility::DailyCapReached {
                count,
                max: self.max_actions_per_day,
            });
        }

        if let Some(last) = ledger.last_action_time()? {
            let elapsed = self.clock.now() - last;
            if elapsed < self.min_interval {
                debug!(?elapsed, "EligibilityPolicy::check: too soon");
                return Ok(Eligibility::TooSoon {
                    elapsed,
                    next_allowed_at: last
                        .checked_add_signed(self.min_interval)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                });
            }
        }

        Ok(Eligibility::Eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
    }

    fn setup(max: u32, interval_hours: i64) -> (EligibilityPolicy, Ledger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let ledger = Ledger::in_memory(clock.clone()).unwrap();
        let policy = EligibilityPolicy::new(max, Duration::hours(interval_hours), clock.clone());
        (policy, ledger, clock)
    }

    #[test]
    fn test_empty_ledger_is_eligible() {
        let (policy, ledger, _) = setup(6, 4);
        assert!(policy.can_act_today(&ledger).unwrap());
        assert!(policy.can_act_now(&ledger).unwrap());
        assert!(policy.is_eligible(&ledger).unwrap());
        assert_eq!(policy.check(&ledger).unwrap(), Eligibility::Eligible);
    }

    #[test]
    fn test_spacing_blocks_until_interval_elapses() {
        let (policy, mut ledger, clock) = setup(6, 4);
        ledger.record_action("a", "1", "rust").unwrap();

        clock.advance(Duration::hours(1));
        assert!(!policy.is_eligible(&ledger).unwrap());
        assert!(policy.can_act_today(&ledger).unwrap());
        assert_eq!(
            policy.check(&ledger).unwrap(),
            Eligibility::TooSoon {
                elapsed: Duration::hours(1),
                next_allowed_at: t0() + Duration::hours(4),
            }
        );

        clock.advance(Duration::hours(4));
        assert!(policy.is_eligible(&ledger).unwrap());
    }

    #[test]
    fn test_huge_interval_does_not_overflow() {
        let clock = Arc::new(ManualClock::new(t0()));
        let mut ledger = Ledger::in_memory(clock.clone()).unwrap();
        let config = PolicyConfig {
            max_actions_per_day: 6,
            min_interval_hours: 1.0e10,
        };
        let policy = EligibilityPolicy::from_config(&config, clock.clone());
        ledger.record_action("a", "1", "rust").unwrap();

        clock.advance(Duration::days(365));
        match policy.check(&ledger).unwrap() {
            Eligibility::TooSoon { next_allowed_at, .. } => assert_eq!(next_allowed_at, DateTime::<Utc>::MAX_UTC),
            other => panic!("expected TooSoon, got {:?}", other),
        }
        assert!(!policy.is_eligible(&ledger).unwrap());
    }

    #[test]
    fn test_interval_boundary_is_inclusive() {
        let (policy, mut ledger, clock) = setup(6, 4);
        ledger.record_action("a", "1", "rust").unwrap();
        clock.advance(Duration::hours(4));
        assert!(policy.can_act_now(&ledger).unwrap());
    }

    #[test]
    fn test_daily_cap_blocks_regardless_of_spacing() {
        let (policy, mut ledger, clock) = setup(6, 0);
        for i in 0..6 {
            ledger.record_action(&format!("item{}", i), "c", "rust").unwrap();
        }

        assert!(!policy.is_eligible(&ledger).unwrap());
        assert!(policy.can_act_now(&ledger).unwrap());
        assert_eq!(
            policy.check(&ledger).unwrap(),
            Eligibility::DailyCapReached { count: 6, max: 6 }
        );

        clock.advance(Duration::hours(10));
        assert!(!policy.is_eligible(&ledger).unwrap());

        // 2024-06-11 00:00
        clock.advance(Duration::hours(5));
        assert_eq!(ledger.count_today().unwrap(), 0);
        assert!(policy.is_eligible(&ledger).unwrap());
    }

    #[test]
    fn test_cap_reported_before_spacing() {
        let (policy, mut ledger, _) = setup(1, 4);
        ledger.record_action("a", "1", "rust").unwrap();
        assert!(matches!(
            policy.check(&ledger).unwrap(),
            Eligibility::DailyCapReached { .. }
        ));
    }

    #[test]
    fn test_eligibility_display() {
        assert_eq!(Eligibility::Eligible.to_string(), "eligible");
        assert_eq!(
            Eligibility::DailyCapReached { count: 6, max: 6 }.to_string(),
            "daily limit reached (6/6)"
        );
    }
}
