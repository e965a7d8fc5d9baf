//! Records of replies that were posted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reply accepted by the forum, identified by the id it assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedReply {
    pub id: String,
}

/// One row of the ledger's action table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Item the reply was posted to
    pub item_id: String,

    /// Id the forum returned for the reply
    pub action_id: String,

    /// Source the item came from
    pub source: String,

    /// When the action was recorded
    pub timestamp: DateTime<Utc>,
}

/// Summary of the ledger for status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub total_actions: u64,
    pub today: u32,
    pub last_action: Option<DateTime<Utc>>,
}

/// A reply the forum accepted but the ledger has not stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub item_id: String,
    pub action_id: String,
    pub source: String,
}
