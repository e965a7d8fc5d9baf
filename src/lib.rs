//! replybot - rate-limited forum reply bot
//!
//! replybot periodically picks a popular, recent forum post, asks an LLM for
//! a reply, checks the reply and posts it. Every posted reply is recorded in
//! a SQLite ledger that enforces a daily cap and a minimum spacing between
//! replies, across restarts.
//!
//! # Core Concepts
//!
//! - **Ledger First**: Rate limits are read from durable storage on every check
//! - **At Most Once**: An item is never replied to twice, even if recording fails
//! - **Failure Isolation**: A failed attempt is logged and the loop carries on
//! - **Injected Time**: Clock and sleep are traits, so the loop runs in simulated time
//!
//! # Modules
//!
//! - [`ledger`] - Persistent record of actions and daily counts
//! - [`policy`] - Daily cap and minimum interval
//! - [`selection`] - Candidate selection across sources
//! - [`scheduler`] - Interval-driven state machine
//! - [`bot`] - One attempt, end to end
//! - [`source`] - Forum source trait and Reddit client
//! - [`llm`] - LLM client trait and OpenAI implementation
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod bot;
pub mod cli;
pub mod clock;
pub mod config;
pub mod content;
pub mod domain;
pub mod generate;
pub mod ledger;
pub mod llm;
pub mod policy;
pub mod prompts;
pub mod scheduler;
pub mod selection;
pub mod source;

// Re-export commonly used types
pub use bot::{AttemptError, AttemptOutcome, Bot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, LlmConfig};
pub use content::{ContentFilter, EnglishFilter, QualityGate, Rejection};
pub use domain::{ActionRecord, Item, LedgerStats, PendingRecord, PostedReply};
pub use generate::{CommentGenerator, LlmCommentGenerator, StyleConfig};
pub use ledger::{Ledger, LedgerError};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient};
pub use policy::{Eligibility, EligibilityPolicy};
pub use scheduler::{Attempt, Scheduler, SchedulerConfig, SchedulerState, SchedulerStats, Sleeper, TokioSleeper};
pub use selection::{CandidateSelector, SourceOutcome};
pub use source::{ForumSource, RedditClient, SourceError};
