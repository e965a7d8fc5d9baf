//! Domain types for replybot
//!
//! Items are what sources offer up for a reply; action records are what the
//! ledger keeps once a reply has been accepted by the forum.

mod action;
mod item;

pub use action::{ActionRecord, LedgerStats, PendingRecord, PostedReply};
pub use item::Item;
