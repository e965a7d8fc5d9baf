//! Forum sources
//!
//! A [`ForumSource`] lists candidate items for a named source (a subreddit)
//! and posts replies to them. The scheduler core only sees the trait; the
//! Reddit client is the one concrete implementation.

use async_trait::async_trait;

mod error;
mod reddit;

pub use error::SourceError;
pub use reddit::{RedditClient, RedditCredentials};

use crate::domain::{Item, PostedReply};

/// External content channel that can be scanned and replied to
#[async_trait]
pub trait ForumSource: Send + Sync {
    /// List up to `limit` items of `source` in the source's own "hot" order
    async fn list_hot_items(&self, source: &str, limit: u32) -> Result<Vec<Item>, SourceError>;

    /// Post `text` as a reply to `item`
    async fn post_reply(&self, item: &Item, text: &str) -> Result<PostedReply, SourceError>;
}
