//! Scheduler states and counters

use std::future::Future;
use std::time::Duration;

/// Where the scheduler loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Attempting,
    Sleeping,
    Terminated,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Attempting => write!(f, "attempting"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Counters kept across the life of one scheduler run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total_attempts: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_polls: u64,
}

/// One unit of scheduled work
///
/// Futures are not required to be `Send`: the loop runs the job in place and
/// never spawns it.
pub trait Attempt {
    type Outcome: std::fmt::Display;
    type Error: std::fmt::Display;

    fn attempt(&mut self) -> impl Future<Output = Result<Self::Outcome, Self::Error>>;
}

/// Waits for a duration
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(SchedulerState::Attempting.to_string(), "attempting");
        assert_eq!(SchedulerState::Terminated.to_string(), "terminated");
    }

    #[tokio::test]
    async fn test_tokio_sleeper_waits() {
        let start = std::time::Instant::now();
        TokioSleeper.sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
