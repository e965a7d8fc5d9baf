//! The attempt pipeline
//!
//! One call to [`Bot::run_once`] is one Attempting phase: flush pending
//! records, check eligibility, select a candidate, generate, gate, post and
//! record. Nothing is retried within an attempt.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::content::{ContentFilter, QualityGate, Rejection};
use crate::domain::{ActionRecord, PendingRecord};
use crate::generate::{CommentGenerator, StyleConfig};
use crate::ledger::{Ledger, LedgerError};
use crate::llm::LlmError;
use crate::policy::{Eligibility, EligibilityPolicy};
use crate::scheduler::Attempt;
use crate::selection::CandidateSelector;
use crate::source::{ForumSource, SourceError};

/// How an attempt ended when nothing went wrong
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    NotEligible(Eligibility),
    NoCandidate,
    GenerationRejected { item_id: String, reason: Rejection },
    Posted(ActionRecord),
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEligible(reason) => write!(f, "not eligible: {}", reason),
            Self::NoCandidate => write!(f, "no suitable item"),
            Self::GenerationRejected { item_id, reason } => {
                write!(f, "generated reply for {} rejected: {}", item_id, reason)
            }
            Self::Posted(record) => write!(f, "posted {} on {}", record.action_id, record.item_id),
        }
    }
}

/// Failures that end an attempt early
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Failed to post reply: {0}")]
    Source(#[from] SourceError),

    #[error("Comment generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Reply {action_id} to {item_id} was posted but not recorded: {source}")]
    Unrecorded {
        item_id: String,
        action_id: String,
        #[source]
        source: LedgerError,
    },
}

/// Owns the ledger and every collaborator needed for an attempt
pub struct Bot {
    ledger: Ledger,
    policy: EligibilityPolicy,
    selector: CandidateSelector,
    forum: Arc<dyn ForumSource>,
    generator: Arc<dyn CommentGenerator>,
    gate: QualityGate,
    style: StyleConfig,
    sources: Vec<String>,
    pending: Vec<PendingRecord>,
}

impl Bot {
    /// Wire up a bot from configuration
    ///
    /// `filter` is shared by candidate selection and the quality gate.
    /// Replies a previous run posted but could not record are picked up from
    /// the ledger's journal and flushed before the first attempt selects.
    pub fn from_config(
        config: &Config,
        ledger: Ledger,
        clock: Arc<dyn Clock>,
        forum: Arc<dyn ForumSource>,
        generator: Arc<dyn CommentGenerator>,
        filter: Arc<dyn ContentFilter>,
    ) -> Result<Self, LedgerError> {
        debug!("Bot::from_config: called");
        let pending = ledger.load_pending()?;
        if !pending.is_empty() {
            warn!(count = pending.len(), "Carrying over replies that were posted but not recorded");
        }
        Ok(Self {
            ledger,
            policy: EligibilityPolicy::from_config(&config.policy, clock.clone()),
            selector: CandidateSelector::from_config(&config.selection, clock, filter.clone()),
            forum,
            generator,
            gate: QualityGate::from_config(&config.content, filter),
            style: StyleConfig::from_config(&config.llm, &config.content),
            sources: config.selection.sources.clone(),
            pending,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    pub fn pending(&self) -> &[PendingRecord] {
        &self.pending
    }

    /// Write the pending list to the journal
    ///
    /// A journal failure is logged only; the in-memory list still guards
    /// this process.
    fn persist_pending(&self) {
        if let Err(e) = self.ledger.save_pending(&self.pending) {
            error!(pending = self.pending.len(), error = %e, "Failed to update pending journal");
        }
    }

    /// Retry recording replies that were posted but not stored
    ///
    /// Stops at the first storage failure and leaves the rest queued.
    fn flush_pending(&mut self) -> Result<(), LedgerError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let result = self.record_pending();
        self.persist_pending();
        result
    }

    fn record_pending(&mut self) -> Result<(), LedgerError> {
        while let Some(record) = self.pending.first() {
            debug!(item_id = %record.item_id, "Bot::flush_pending: retrying");
            match self
                .ledger
                .record_action(&record.item_id, &record.action_id, &record.source)
            {
                Ok(_) => info!(item_id = %record.item_id, "Recorded pending action"),
                Err(e) if e.is_duplicate() => {
                    warn!(item_id = %record.item_id, "Pending action was already recorded")
                }
                Err(e) => return Err(e),
            }
            self.pending.remove(0);
        }
        Ok(())
    }

    /// Run a single attempt
    pub async fn run_once(&mut self) -> Result<AttemptOutcome, AttemptError> {
        debug!("Bot::run_once: called");
        self.flush_pending()?;

        let eligibility = self.policy.check(&self.ledger)?;
        if !eligibility.is_eligible() {
            info!(reason = %eligibility, "Not eligible to post");
            return Ok(AttemptOutcome::NotEligible(eligibility));
        }

        let exclude: HashSet<String> = self.pending.iter().map(|p| p.item_id.clone()).collect();
        let Some(item) = self
            .selector
            .select_candidate(self.forum.as_ref(), &self.ledger, &self.sources, &exclude)
            .await?
        else {
            return Ok(AttemptOutcome::NoCandidate);
        };

        let raw = self
            .generator
            .generate(&item.title, &item.body, &item.permalink, &self.style)
            .await?;

        let text = match self.gate.check(&raw) {
            Ok(text) => text,
            Err(reason) => {
                warn!(item_id = %item.id, %reason, "Generated reply rejected");
                return Ok(AttemptOutcome::GenerationRejected {
                    item_id: item.id,
                    reason,
                });
            }
        };

        let reply = self.forum.post_reply(&item, &text).await?;
        info!(item_id = %item.id, reply_id = %reply.id, url = %item.permalink, "Posted reply");

        match self.ledger.record_action(&item.id, &reply.id, &item.source) {
            Ok(record) => Ok(AttemptOutcome::Posted(record)),
            Err(e) if e.is_duplicate() => Err(e.into()),
            Err(e) => {
                error!(item_id = %item.id, reply_id = %reply.id, error = %e, "Failed to record posted reply");
                self.pending.push(PendingRecord {
                    item_id: item.id.clone(),
                    action_id: reply.id.clone(),
                    source: item.source.clone(),
                });
                self.persist_pending();
                Err(AttemptError::Unrecorded {
                    item_id: item.id,
                    action_id: reply.id,
                    source: e,
                })
            }
        }
    }

    /// Release the ledger
    ///
    /// Replies that still cannot be recorded stay in the journal for the
    /// next run.
    pub fn close(mut self) -> Result<(), LedgerError> {
        debug!(pending = self.pending.len(), "Bot::close: called");
        if let Err(e) = self.flush_pending() {
            error!(pending = self.pending.len(), error = %e, "Leaving unrecorded replies in the journal");
        }
        self.ledger.close()
    }
}

impl Attempt for Bot {
    type Outcome = AttemptOutcome;
    type Error = AttemptError;

    async fn attempt(&mut self) -> Result<AttemptOutcome, AttemptError> {
        self.run_once().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::content::AcceptAll;
    use crate::domain::{Item, PostedReply};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Mutex;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
    }

    struct OneItemSource {
        posts: Mutex<Vec<String>>,
        fail_post: bool,
        /// Second connection that records the reply before the bot does
        racer: Mutex<Option<rusqlite::Connection>>,
    }

    impl OneItemSource {
        fn new(fail_post: bool) -> Self {
            Self {
                posts: Mutex::new(Vec::new()),
                fail_post,
                racer: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ForumSource for OneItemSource {
        async fn list_hot_items(&self, source: &str, _limit: u32) -> Result<Vec<Item>, SourceError> {
            Ok(vec![Item {
                id: "t3_one".to_string(),
                source: source.to_string(),
                title: "What is attention?".to_string(),
                body: String::new(),
                created_at: t0() - Duration::hours(1),
                score: 100,
                permalink: "https://reddit.com/r/ml/comments/one".to_string(),
            }])
        }

        async fn post_reply(&self, _item: &Item, text: &str) -> Result<PostedReply, SourceError> {
            if self.fail_post {
                return Err(SourceError::Rejected("THREAD_LOCKED".to_string()));
            }
            self.posts.lock().unwrap().push(text.to_string());
            if let Some(conn) = self.racer.lock().unwrap().take() {
                conn.execute(
                    "INSERT INTO actions (item_id, action_id, source, timestamp)
                     VALUES ('t3_one', 't1_reply', 'ml', '2024-06-10T08:59:00.000000Z')",
                    [],
                )
                .unwrap();
            }
            Ok(PostedReply {
                id: "t1_reply".to_string(),
            })
        }
    }

    struct FixedGenerator(String);

    #[async_trait]
    impl CommentGenerator for FixedGenerator {
        async fn generate(&self, _: &str, _: &str, _: &str, _: &StyleConfig) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    fn bot_with(ledger: Ledger, clock: Arc<ManualClock>, forum: Arc<OneItemSource>, reply: &str) -> Bot {
        let mut config = Config::default();
        config.selection.sources = vec!["ml".to_string()];
        Bot::from_config(
            &config,
            ledger,
            clock,
            forum,
            Arc::new(FixedGenerator(reply.to_string())),
            Arc::new(AcceptAll),
        )
        .unwrap()
    }

    fn bot(reply: &str, fail_post: bool) -> (Bot, Arc<OneItemSource>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let forum = Arc::new(OneItemSource::new(fail_post));
        let ledger = Ledger::in_memory(clock.clone()).unwrap();
        (bot_with(ledger, clock, forum.clone(), reply), forum)
    }

    #[tokio::test]
    async fn test_posts_and_records() {
        let (mut bot, forum) = bot(&"x".repeat(200), false);
        let outcome = bot.run_once().await.unwrap();

        match outcome {
            AttemptOutcome::Posted(record) => {
                assert_eq!(record.item_id, "t3_one");
                assert_eq!(record.action_id, "t1_reply");
                assert_eq!(record.source, "ml");
            }
            other => panic!("expected Posted, got {:?}", other),
        }
        assert_eq!(forum.posts.lock().unwrap().len(), 1);
        assert!(bot.ledger().has_acted_on("t3_one").unwrap());
    }

    #[tokio::test]
    async fn test_second_attempt_is_not_eligible() {
        let (mut bot, _) = bot(&"x".repeat(200), false);
        bot.run_once().await.unwrap();
        let outcome = bot.run_once().await.unwrap();
        assert!(matches!(
            outcome,
            AttemptOutcome::NotEligible(Eligibility::TooSoon { .. })
        ));
    }

    #[tokio::test]
    async fn test_short_reply_is_rejected_without_posting() {
        let (mut bot, forum) = bot(&"x".repeat(50), false);
        let outcome = bot.run_once().await.unwrap();

        assert_eq!(
            outcome,
            AttemptOutcome::GenerationRejected {
                item_id: "t3_one".to_string(),
                reason: Rejection::TooShort { length: 50, min: 100 },
            }
        );
        assert!(forum.posts.lock().unwrap().is_empty());
        assert_eq!(bot.ledger().stats().unwrap().total_actions, 0);
    }

    #[tokio::test]
    async fn test_post_failure_is_an_error_and_not_recorded() {
        let (mut bot, _) = bot(&"x".repeat(200), true);
        let err = bot.run_once().await.unwrap_err();
        assert!(matches!(err, AttemptError::Source(SourceError::Rejected(_))));
        assert!(!bot.ledger().has_acted_on("t3_one").unwrap());
        assert!(bot.pending().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_record_after_post_fails_the_attempt() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("replybot.db");
        let clock = Arc::new(ManualClock::new(t0()));
        let ledger = Ledger::open(&db_path, clock.clone()).unwrap();

        let forum = Arc::new(OneItemSource::new(false));
        *forum.racer.lock().unwrap() = Some(rusqlite::Connection::open(&db_path).unwrap());
        let mut bot = bot_with(ledger, clock, forum.clone(), &"x".repeat(200));

        let err = bot.run_once().await.unwrap_err();
        assert!(matches!(
            err,
            AttemptError::Ledger(LedgerError::DuplicateAction { ref item_id, ref action_id })
                if item_id == "t3_one" && action_id == "t1_reply"
        ));
        assert_eq!(forum.posts.lock().unwrap().len(), 1);
        assert!(bot.pending().is_empty());
        assert_eq!(bot.ledger().stats().unwrap().total_actions, 1);
        assert!(!temp_dir.path().join("replybot.pending.json").exists());
    }

    #[tokio::test]
    async fn test_pending_already_in_ledger_counts_as_recorded() {
        let (mut bot, forum) = bot(&"x".repeat(200), false);
        bot.ledger.record_action("t3_old", "t1_old", "ml").unwrap();
        bot.pending.push(PendingRecord {
            item_id: "t3_old".to_string(),
            action_id: "t1_old".to_string(),
            source: "ml".to_string(),
        });

        let outcome = bot.run_once().await.unwrap();

        assert!(bot.pending().is_empty());
        assert_eq!(bot.ledger().stats().unwrap().total_actions, 1);
        assert!(matches!(
            outcome,
            AttemptOutcome::NotEligible(Eligibility::TooSoon { .. })
        ));
        assert!(forum.posts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_outcome_display() {
        let outcome = AttemptOutcome::GenerationRejected {
            item_id: "t3_x".to_string(),
            reason: Rejection::ContentRejected,
        };
        assert_eq!(
            outcome.to_string(),
            "generated reply for t3_x rejected: rejected by content filter"
        );
    }
}
