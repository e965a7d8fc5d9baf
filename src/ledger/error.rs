//! Ledger error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Action {action_id} already recorded for item {item_id}")]
    DuplicateAction { item_id: String, action_id: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create ledger directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported ledger schema version {found} (supported: {supported})")]
    UnsupportedSchema { supported: i32, found: i32 },

    #[error("Invalid timestamp in ledger: {0}")]
    InvalidTimestamp(String),

    #[error("Failed to access pending journal {}: {source}", path.display())]
    Journal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed pending journal: {0}")]
    JournalFormat(#[from] serde_json::Error),
}

impl LedgerError {
    /// Check if this is an integrity violation rather than a storage failure
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerError::DuplicateAction { .. })
    }
}
