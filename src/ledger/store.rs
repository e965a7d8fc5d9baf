//! SQLite-backed ledger implementation

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::{debug, info};

use super::{LedgerError, PendingJournal};
use crate::clock::Clock;
use crate::domain::{ActionRecord, LedgerStats, PendingRecord};

/// Schema version stored in `PRAGMA user_version`
const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS actions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id TEXT NOT NULL,
        action_id TEXT NOT NULL,
        source TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        UNIQUE(item_id, action_id)
    );
    CREATE INDEX IF NOT EXISTS idx_actions_item_id ON actions(item_id);
    CREATE TABLE IF NOT EXISTS daily_counts (
        date TEXT PRIMARY KEY,
        count INTEGER NOT NULL DEFAULT 0
    );
";

/// Durable record of past actions and per-day counts
///
/// Owns the single long-lived SQLite connection. Every write commits before
/// returning, with `synchronous = FULL`, so a successful call survives a crash
/// immediately afterwards.
pub struct Ledger {
    conn: Connection,
    clock: Arc<dyn Clock>,
    path: Option<PathBuf>,
    journal: Option<PendingJournal>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Ledger {
    /// Open (or create) the ledger database at `path`
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "Ledger::open: called");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| LedgerError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path)?;
        let ledger = Self {
            conn,
            clock,
            journal: Some(PendingJournal::for_database(&path)),
            path: Some(path),
        };
        ledger.bootstrap()?;

        info!(path = ?ledger.path, "Ledger opened");
        Ok(ledger)
    }

    /// Open a throwaway in-memory ledger
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        debug!("Ledger::in_memory: called");
        let ledger = Self {
            conn: Connection::open_in_memory()?,
            clock,
            path: None,
            journal: None,
        };
        ledger.bootstrap()?;
        Ok(ledger)
    }

    fn bootstrap(&self) -> Result<(), LedgerError> {
        debug!("Ledger::bootstrap: called");
        let found: i32 = self.conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if found > SCHEMA_VERSION {
            return Err(LedgerError::UnsupportedSchema {
                supported: SCHEMA_VERSION,
                found,
            });
        }

        let mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(%mode, "Ledger::bootstrap: journal mode");
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.conn.execute_batch(SCHEMA)?;

        if found < SCHEMA_VERSION {
            debug!(found, "Ledger::bootstrap: stamping schema version");
            self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    /// Path of the backing database, `None` for in-memory ledgers
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replies posted by an earlier run that never reached the database
    ///
    /// In-memory ledgers have no journal and always return an empty list.
    pub fn load_pending(&self) -> Result<Vec<PendingRecord>, LedgerError> {
        match &self.journal {
            Some(journal) => journal.load(),
            None => Ok(Vec::new()),
        }
    }

    /// Persist the current set of unrecorded replies
    pub fn save_pending(&self, records: &[PendingRecord]) -> Result<(), LedgerError> {
        match &self.journal {
            Some(journal) => journal.save(records),
            None => Ok(()),
        }
    }

    /// Whether any action has been recorded for `item_id`
    pub fn has_acted_on(&self, item_id: &str) -> Result<bool, LedgerError> {
        debug!(%item_id, "Ledger::has_acted_on: called");
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM actions WHERE item_id = ?1 LIMIT 1",
                params![item_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Record a completed action and bump today's counter in one transaction
    ///
    /// Fails with [`LedgerError::DuplicateAction`] if the `(item_id, action_id)`
    /// pair already exists, in which case nothing is written.
    pub fn record_action(
        &mut self,
        item_id: &str,
        action_id: &str,
        source: &str,
    ) -> Result<ActionRecord, LedgerError> {
        debug!(%item_id, %action_id, %source, "Ledger::record_action: called");
        let timestamp = self.clock.now();
        let date = date_key(timestamp.date_naive());

        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO actions (item_id, action_id, source, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![item_id, action_id, source, timestamp_key(timestamp)],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                debug!(%item_id, %action_id, "Ledger::record_action: duplicate pair");
                return Err(LedgerError::DuplicateAction {
                    item_id: item_id.to_string(),
                    action_id: action_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        tx.execute(
            "INSERT INTO daily_counts (date, count) VALUES (?1, 1)
             ON CONFLICT(date) DO UPDATE SET count = count + 1",
            params![date],
        )?;

        tx.commit()?;

        info!(%item_id, %action_id, %source, %date, "Recorded action");
        Ok(ActionRecord {
            item_id: item_id.to_string(),
            action_id: action_id.to_string(),
            source: source.to_string(),
            timestamp,
        })
    }

    /// Number of actions recorded on the clock's current date
    pub fn count_today(&self) -> Result<u32, LedgerError> {
        self.count_on(self.clock.now().date_naive())
    }

    /// Number of actions recorded on `date`
    pub fn count_on(&self, date: NaiveDate) -> Result<u32, LedgerError> {
        debug!(%date, "Ledger::count_on: called");
        let count = self
            .conn
            .query_row(
                "SELECT count FROM daily_counts WHERE date = ?1",
                params![date_key(date)],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    /// Most recent action timestamp, if any action was ever recorded
    pub fn last_action_time(&self) -> Result<Option<DateTime<Utc>>, LedgerError> {
        debug!("Ledger::last_action_time: called");
        let max: Option<String> = self
            .conn
            .query_row("SELECT MAX(timestamp) FROM actions", [], |row| row.get(0))?;
        max.map(|s| parse_timestamp(&s)).transpose()
    }

    /// Most recent actions, newest first
    pub fn recent_actions(&self, limit: usize) -> Result<Vec<ActionRecord>, LedgerError> {
        debug!(limit, "Ledger::recent_actions: called");
        let mut stmt = self.conn.prepare(
            "SELECT item_id, action_id, source, timestamp FROM actions
             ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (item_id, action_id, source, timestamp) = row?;
            records.push(ActionRecord {
                item_id,
                action_id,
                source,
                timestamp: parse_timestamp(&timestamp)?,
            });
        }
        Ok(records)
    }

    /// Totals for the `status` command
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        debug!("Ledger::stats: called");
        let total: i64 = self.conn.query_row("SELECT COUNT(*) FROM actions", [], |row| row.get(0))?;
        Ok(LedgerStats {
            total_actions: total.max(0) as u64,
            today: self.count_today()?,
            last_action: self.last_action_time()?,
        })
    }

    /// Release the connection, surfacing any error SQLite reports on close
    pub fn close(self) -> Result<(), LedgerError> {
        debug!(path = ?self.path, "Ledger::close: called");
        self.conn.close().map_err(|(_, e)| LedgerError::Sqlite(e))?;
        info!("Ledger closed");
        Ok(())
    }
}

/// Fixed-width UTC timestamp so `MAX(timestamp)` orders chronologically
fn timestamp_key(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::InvalidTimestamp(format!("{}: {}", s, e)))
}
