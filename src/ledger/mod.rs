//! Persistent ledger of posted replies
//!
//! Two SQLite tables back the rate limits:
//!
//! ```text
//! actions       (item_id, action_id) unique, one row per posted reply
//! daily_counts  date -> count, bumped in the same transaction as the insert
//! ```
//!
//! The ledger is the only writer of either table. Replies the forum accepted
//! but the database could not store are kept in a JSON journal beside it
//! until they can be recorded.

mod error;
mod pending;
mod store;

pub use error::LedgerError;
pub use pending::PendingJournal;
pub use store::Ledger;
