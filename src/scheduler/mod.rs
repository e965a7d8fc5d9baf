//! Scheduler loop
//!
//! Drives one recurring attempt as an explicit state machine
//! (Idle → Attempting → Sleeping → ... → Terminated) with an injected clock
//! and sleeper, so the whole loop can be run against simulated time.

mod config;
mod core;
mod state;

pub use config::SchedulerConfig;
pub use core::Scheduler;
pub use state::{Attempt, SchedulerState, SchedulerStats, Sleeper, TokioSleeper};
