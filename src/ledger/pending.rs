//! Journal of replies posted but not yet recorded
//!
//! Lives next to the database as `<db stem>.pending.json`. The file exists
//! only while at least one reply is outstanding.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::LedgerError;
use crate::domain::PendingRecord;

#[derive(Debug, Clone)]
pub struct PendingJournal {
    path: PathBuf,
}

impl PendingJournal {
    /// Journal that belongs to the database at `db_path`
    pub fn for_database(db_path: &Path) -> Self {
        Self {
            path: db_path.with_extension("pending.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read outstanding records; a missing file means there are none
    pub fn load(&self) -> Result<Vec<PendingRecord>, LedgerError> {
        debug!(path = ?self.path, "PendingJournal::load: called");
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LedgerError::Journal {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let records: Vec<PendingRecord> = serde_json::from_str(&content)?;
        if !records.is_empty() {
            info!(count = records.len(), path = ?self.path, "Loaded unrecorded replies");
        }
        Ok(records)
    }

    /// Replace the journal with `records`, removing it when empty
    pub fn save(&self, records: &[PendingRecord]) -> Result<(), LedgerError> {
        debug!(count = records.len(), path = ?self.path, "PendingJournal::save: called");
        let journal_err = |source: std::io::Error| LedgerError::Journal {
            path: self.path.clone(),
            source,
        };

        if records.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(journal_err(e)),
            };
        }

        let json = serde_json::to_string_pretty(records)?;
        let tmp_path = self.path.with_extension("pending.json.tmp");
        fs::write(&tmp_path, json).map_err(journal_err)?;
        fs::File::open(&tmp_path)
            .and_then(|file| file.sync_all())
            .map_err(journal_err)?;
        fs::rename(&tmp_path, &self.path).map_err(journal_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(item_id: &str) -> PendingRecord {
        PendingRecord {
            item_id: item_id.to_string(),
            action_id: "c1".to_string(),
            source: "rust".to_string(),
        }
    }

    #[test]
    fn test_path_sits_next_to_database() {
        let journal = PendingJournal::for_database(Path::new("/data/replybot/replybot.db"));
        assert_eq!(journal.path(), Path::new("/data/replybot/replybot.pending.json"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let journal = PendingJournal::for_database(&temp_dir.path().join("replybot.db"));
        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_clear() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let journal = PendingJournal::for_database(&temp_dir.path().join("replybot.db"));

        journal.save(&[record("a1"), record("a2")]).unwrap();
        assert!(journal.path().exists());
        assert_eq!(journal.load().unwrap(), vec![record("a1"), record("a2")]);

        journal.save(&[]).unwrap();
        assert!(!journal.path().exists());
        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let journal = PendingJournal::for_database(&temp_dir.path().join("replybot.db"));
        fs::write(journal.path(), "not json").unwrap();
        assert!(matches!(journal.load(), Err(LedgerError::JournalFormat(_))));
    }
}
