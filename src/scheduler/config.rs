//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Hours between scheduled attempts
    #[serde(default = "default_interval_hours", rename = "interval-hours")]
    pub interval_hours: f64,

    /// Seconds between checks for a due attempt or shutdown
    #[serde(default = "default_poll_secs", rename = "poll-secs")]
    pub poll_secs: u64,

    /// Seconds to back off after a failed attempt
    #[serde(default = "default_cooldown_secs", rename = "cooldown-secs")]
    pub cooldown_secs: u64,
}

fn default_interval_hours() -> f64 {
    4.0
}

fn default_poll_secs() -> u64 {
    60
}

fn default_cooldown_secs() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            poll_secs: default_poll_secs(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl SchedulerConfig {
    /// Get the attempt interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_hours.max(0.0) * 3600.0).unwrap_or(Duration::MAX)
    }

    /// Get the poll tick as a Duration
    pub fn poll_tick(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }

    /// Get the failure cooldown as a Duration
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}
