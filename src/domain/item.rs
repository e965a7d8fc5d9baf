//! Candidate items pulled from a forum source

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A piece of content a reply can be attached to (e.g. a forum post)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Identifier, unique within its source
    pub id: String,

    /// Name of the source the item was listed from
    pub source: String,

    pub title: String,

    /// Body text, empty for link posts
    pub body: String,

    pub created_at: DateTime<Utc>,

    /// Source-defined popularity score
    pub score: i64,

    /// Absolute URL of the item
    pub permalink: String,
}

impl Item {
    /// How long ago the item was created, relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Title and body joined for language/quality checks
    pub fn text(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(body: &str) -> Item {
        Item {
            id: "abc".to_string(),
            source: "rust".to_string(),
            title: "Borrow checker question".to_string(),
            body: body.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            score: 42,
            permalink: "https://reddit.com/r/rust/comments/abc".to_string(),
        }
    }

    #[test]
    fn test_age() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 11, 30, 0).unwrap();
        assert_eq!(item("").age(now), Duration::minutes(210));
    }

    #[test]
    fn test_text_joins_title_and_body() {
        assert_eq!(item("").text(), "Borrow checker question");
        assert_eq!(item("Why?").text(), "Borrow checker question Why?");
    }
}
