//! Scheduler implementation

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::config::SchedulerConfig;
use super::state::{Attempt, SchedulerState, SchedulerStats, Sleeper};
use crate::clock::Clock;

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Runs an [`Attempt`] once at startup and then once per interval
///
/// Attempts are never pre-empted. Shutdown is observed between attempts,
/// while sleeping or cooling down after a failure.
pub struct Scheduler<S: Sleeper> {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    sleeper: S,
    state: SchedulerState,
    stats: SchedulerStats,
}

impl<S: Sleeper> Scheduler<S> {
    /// Create a new scheduler with the given configuration
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>, sleeper: S) -> Self {
        debug!(?config, "Scheduler::new: called");
        Self {
            config,
            clock,
            sleeper,
            state: SchedulerState::Idle,
            stats: SchedulerStats::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    fn transition(&mut self, to: SchedulerState) {
        debug!(from = %self.state, %to, "Scheduler::transition: called");
        self.state = to;
    }

    /// Sleep for `duration` unless shutdown arrives first
    ///
    /// Returns true when shutdown was requested. A closed channel counts as a
    /// request, since nobody is left to send one.
    async fn wait(&self, duration: Duration, shutdown_rx: &mut mpsc::Receiver<()>) -> bool {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => true,
            _ = self.sleeper.sleep(duration) => false,
        }
    }

    /// First trigger after `now` on the fixed schedule anchored at `due`
    ///
    /// Missed slots are skipped. Saturates at the largest representable time.
    fn next_trigger(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        if due > now {
            return due;
        }
        let step = to_chrono(self.config.interval()).num_milliseconds().max(1);
        let behind = (now - due).num_milliseconds();
        let slots = behind / step + 1;
        slots
            .checked_mul(step)
            .and_then(chrono::Duration::try_milliseconds)
            .and_then(|ahead| due.checked_add_signed(ahead))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Run until shutdown is requested
    pub async fn run<A: Attempt>(&mut self, job: &mut A, mut shutdown_rx: mpsc::Receiver<()>) -> SchedulerStats {
        debug!("Scheduler::run: called");
        info!(
            interval_hours = self.config.interval_hours,
            poll_secs = self.config.poll_secs,
            "Scheduler started"
        );

        let mut next_due = self.clock.now();
        self.state = SchedulerState::Idle;

        loop {
            match self.state {
                // The first attempt runs as soon as the loop starts
                SchedulerState::Idle => self.transition(SchedulerState::Attempting),

                SchedulerState::Attempting => {
                    if shutdown_rx.try_recv().is_ok() {
                        self.transition(SchedulerState::Terminated);
                        continue;
                    }

                    self.stats.total_attempts += 1;
                    let started = self.clock.now();
                    next_due = self.next_trigger(next_due, started);

                    match job.attempt().await {
                        Ok(outcome) => {
                            self.stats.total_succeeded += 1;
                            info!(%outcome, next = %next_due, "Attempt finished");
                            self.transition(SchedulerState::Sleeping);
                        }
                        Err(e) => {
                            self.stats.total_failed += 1;
                            error!(error = %e, cooldown_secs = self.config.cooldown_secs, "Attempt failed");
                            if self.wait(self.config.cooldown(), &mut shutdown_rx).await {
                                self.transition(SchedulerState::Terminated);
                            } else {
                                self.transition(SchedulerState::Sleeping);
                            }
                        }
                    }
                }

                SchedulerState::Sleeping => {
                    let now = self.clock.now();
                    if now >= next_due {
                        self.transition(SchedulerState::Attempting);
                        continue;
                    }

                    let remaining = (next_due - now).to_std().unwrap_or(Duration::ZERO);
                    let tick = remaining.min(self.config.poll_tick());
                    if self.wait(tick, &mut shutdown_rx).await {
                        self.transition(SchedulerState::Terminated);
                    } else {
                        self.stats.total_polls += 1;
                    }
                }

                SchedulerState::Terminated => {
                    info!(
                        attempts = self.stats.total_attempts,
                        failed = self.stats.total_failed,
                        "Scheduler terminated"
                    );
                    return self.stats.clone();
                }
            }
        }
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

    /// Sleeper that moves a manual clock instead of waiting
    struct SimSleeper {
        clock: Arc<ManualClock>,
    }

    impl Sleeper for SimSleeper {
        async fn sleep(&self, duration: Duration) {
            self.clock.advance(to_chrono(duration));
            tokio::task::yield_now().await;
        }
    }

    /// Records when it ran, fails on the listed calls, asks for shutdown after `stop_after` calls
    struct Recorder {
        clock: Arc<ManualClock>,
        runs: Vec<DateTime<Utc>>,
        fail_on: Vec<usize>,
        stop_after: usize,
        shutdown_tx: mpsc::Sender<()>,
    }

    impl Attempt for Recorder {
        type Outcome = &'static str;
        type Error = String;

        async fn attempt(&mut self) -> Result<&'static str, String> {
            self.runs.push(self.clock.now());
            let n = self.runs.len();
            if n == self.stop_after {
                let _ = self.shutdown_tx.try_send(());
            }
            if self.fail_on.contains(&n) {
                Err(format!("attempt {} failed", n))
            } else {
                Ok("done")
            }
        }
    }

    fn setup(fail_on: Vec<usize>, stop_after: usize) -> (Scheduler<SimSleeper>, Recorder, mpsc::Receiver<()>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            clock.clone(),
            SimSleeper { clock: clock.clone() },
        );
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let recorder = Recorder {
            clock,
            runs: Vec::new(),
            fail_on,
            stop_after,
            shutdown_tx,
        };
        (scheduler, recorder, shutdown_rx)
    }

    #[tokio::test]
    async fn test_runs_at_start_then_every_interval() {
        let (mut scheduler, mut job, rx) = setup(vec![], 3);
        let stats = scheduler.run(&mut job, rx).await;

        assert_eq!(
            job.runs,
            vec![t0(), t0() + chrono::Duration::hours(4), t0() + chrono::Duration::hours(8)]
        );
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.total_succeeded, 3);
        assert_eq!(scheduler.state(), SchedulerState::Terminated);
    }

    #[tokio::test]
    async fn test_starts_idle_and_honours_early_shutdown() {
        let (mut scheduler, mut job, rx) = setup(vec![], usize::MAX);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        job.shutdown_tx.try_send(()).unwrap();
        let stats = scheduler.run(&mut job, rx).await;

        assert!(job.runs.is_empty());
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(scheduler.state(), SchedulerState::Terminated);
    }

    #[tokio::test]
    async fn test_failed_attempt_does_not_stop_loop() {
        let (mut scheduler, mut job, rx) = setup(vec![1, 2], 4);
        let stats = scheduler.run(&mut job, rx).await;

        assert_eq!(stats.total_attempts, 4);
        assert_eq!(stats.total_failed, 2);
        assert_eq!(stats.total_succeeded, 2);
        // Cooldown happens inside the interval, so the schedule does not drift
        assert_eq!(job.runs[1], t0() + chrono::Duration::hours(4));
        assert_eq!(job.runs[3], t0() + chrono::Duration::hours(12));
    }

    #[tokio::test]
    async fn test_shutdown_before_first_attempt() {
        let (mut scheduler, mut job, rx) = setup(vec![], usize::MAX);
        let clock = job.clock.clone();
        let tx = job.shutdown_tx.clone();

        // Ask for shutdown before the loop starts: the first attempt is skipped
        tx.send(()).await.unwrap();
        let stats = scheduler.run(&mut job, rx).await;

        assert_eq!(stats.total_attempts, 0);
        assert!(job.runs.is_empty());
        assert_eq!(clock.now(), t0());
    }

    #[tokio::test]
    async fn test_closed_channel_terminates() {
        let (mut scheduler, mut job, rx) = setup(vec![], usize::MAX);
        // Replace the job's sender so every sender is gone
        let (dummy_tx, _) = mpsc::channel(1);
        job.shutdown_tx = dummy_tx;

        let stats = scheduler.run(&mut job, rx).await;
        assert_eq!(stats.total_attempts, 1);
        assert_eq!(stats.total_polls, 0);
    }

    #[tokio::test]
    async fn test_poll_ticks_are_coarse() {
        let (mut scheduler, mut job, rx) = setup(vec![], 2);
        let stats = scheduler.run(&mut job, rx).await;

        // 4 hours of 60 second ticks between the two attempts
        assert_eq!(stats.total_polls, 4 * 60);
    }

    #[test]
    fn test_next_trigger_skips_missed_slots() {
        let clock = Arc::new(ManualClock::new(t0()));
        let scheduler = Scheduler::new(SchedulerConfig::default(), clock.clone(), SimSleeper { clock });

        let late = t0() + chrono::Duration::hours(9);
        assert_eq!(scheduler.next_trigger(t0(), late), t0() + chrono::Duration::hours(12));
        assert_eq!(scheduler.next_trigger(t0(), t0()), t0() + chrono::Duration::hours(4));
    }

    #[test]
    fn test_next_trigger_saturates_on_huge_interval() {
        let clock = Arc::new(ManualClock::new(t0()));
        let config = SchedulerConfig {
            interval_hours: 1.0e10,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(config, clock.clone(), SimSleeper { clock });

        assert_eq!(scheduler.next_trigger(t0(), t0()), DateTime::<Utc>::MAX_UTC);
    }
}
