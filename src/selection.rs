//! Candidate selection
//!
//! Walks the configured sources in priority order and returns the first item
//! that passes every filter. Each source is listed inside its own error
//! boundary: a source that fails is logged and skipped, the rest are still
//! scanned. Ledger failures are not source failures and abort selection.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SelectionConfig;
use crate::content::ContentFilter;
use crate::domain::Item;
use crate::ledger::{Ledger, LedgerError};
use crate::source::{ForumSource, SourceError};

/// Result of listing one source
#[derive(Debug)]
pub enum SourceOutcome {
    Listed(Vec<Item>),
    Failed { transient: bool, error: SourceError },
}

/// Why an item was passed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    TooOld,
    LowScore,
    AlreadyActedOn,
    ContentRejected,
}

impl std::fmt::Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooOld => write!(f, "too old"),
            Self::LowScore => write!(f, "score too low"),
            Self::AlreadyActedOn => write!(f, "already replied"),
            Self::ContentRejected => write!(f, "rejected by content filter"),
        }
    }
}

/// Picks the next item to reply to
pub struct CandidateSelector {
    page_size: u32,
    max_item_age: Duration,
    min_item_score: i64,
    clock: Arc<dyn Clock>,
    filter: Arc<dyn ContentFilter>,
}

impl CandidateSelector {
    pub fn new(
        page_size: u32,
        max_item_age: Duration,
        min_item_score: i64,
        clock: Arc<dyn Clock>,
        filter: Arc<dyn ContentFilter>,
    ) -> Self {
        debug!(page_size, ?max_item_age, min_item_score, "CandidateSelector::new: called");
        Self {
            page_size,
            max_item_age,
            min_item_score,
            clock,
            filter,
        }
    }

    pub fn from_config(config: &SelectionConfig, clock: Arc<dyn Clock>, filter: Arc<dyn ContentFilter>) -> Self {
        Self::new(
            config.page_size,
            config.max_item_age(),
            config.min_item_score,
            clock,
            filter,
        )
    }

    /// List one source, turning any error into a classified outcome
    pub async fn list_source(&self, forum: &dyn ForumSource, source: &str) -> SourceOutcome {
        debug!(%source, "CandidateSelector::list_source: called");
        match forum.list_hot_items(source, self.page_size).await {
            Ok(items) => SourceOutcome::Listed(items),
            Err(error) => SourceOutcome::Failed {
                transient: error.is_transient(),
                error,
            },
        }
    }

    /// Apply the item filters in order, stopping at the first that fails
    ///
    /// `exclude` holds item ids that must be treated as already acted on even
    /// though the ledger does not know about them yet.
    pub fn screen(&self, item: &Item, ledger: &Ledger, exclude: &HashSet<String>) -> Result<Option<Skip>, LedgerError> {
        if item.age(self.clock.now()) > self.max_item_age {
            return Ok(Some(Skip::TooOld));
        }
        if item.score < self.min_item_score {
            return Ok(Some(Skip::LowScore));
        }
        if exclude.contains(&item.id) || ledger.has_acted_on(&item.id)? {
            return Ok(Some(Skip::AlreadyActedOn));
        }
        if !self.filter.is_acceptable(&item.text()) {
            return Ok(Some(Skip::ContentRejected));
        }
        Ok(None)
    }

    /// Return the first item across `sources` that passes every filter
    pub async fn select_candidate(
        &self,
        forum: &dyn ForumSource,
        ledger: &Ledger,
        sources: &[String],
        exclude: &HashSet<String>,
    ) -> Result<Option<Item>, LedgerError> {
        debug!(sources = sources.len(), "CandidateSelector::select_candidate: called");

        for source in sources {
            let items = match self.list_source(forum, source).await {
                SourceOutcome::Listed(items) => items,
                SourceOutcome::Failed { transient, error } => {
                    warn!(%source, transient, error = %error, "Skipping source");
                    continue;
                }
            };
            debug!(%source, count = items.len(), "CandidateSelector::select_candidate: listed");

            for item in items {
                match self.screen(&item, ledger, exclude)? {
                    Some(skip) => debug!(%source, id = %item.id, %skip, "Skipping item"),
                    None => {
                        info!(%source, id = %item.id, title = %item.title, "Selected candidate");
                        return Ok(Some(item));
                    }
                }
            }
        }

        info!("No suitable item found in any source");
        Ok(None)
    }
}
