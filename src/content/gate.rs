//! Quality gate for generated replies

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use super::ContentFilter;
use crate::config::ContentConfig;

/// A blank line between two lines of text; whitespace-only lines count as blank
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n").expect("paragraph break pattern is valid"));

/// Why a generated reply was not posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TooShort { length: usize, min: usize },
    TooLong { length: usize, max: usize },
    TooManyParagraphs { count: usize, max: usize },
    ContentRejected,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort { length, min } => write!(f, "too short ({} < {} chars)", length, min),
            Self::TooLong { length, max } => write!(f, "too long ({} > {} chars)", length, max),
            Self::TooManyParagraphs { count, max } => write!(f, "too many paragraphs ({} > {})", count, max),
            Self::ContentRejected => write!(f, "rejected by content filter"),
        }
    }
}

/// Length, paragraph and language rules applied before posting
pub struct QualityGate {
    min_length: usize,
    max_length: usize,
    max_paragraphs: usize,
    filter: Arc<dyn ContentFilter>,
}

impl QualityGate {
    pub fn new(min_length: usize, max_length: usize, max_paragraphs: usize, filter: Arc<dyn ContentFilter>) -> Self {
        debug!(min_length, max_length, max_paragraphs, "QualityGate::new: called");
        Self {
            min_length,
            max_length,
            max_paragraphs,
            filter,
        }
    }

    pub fn from_config(config: &ContentConfig, filter: Arc<dyn ContentFilter>) -> Self {
        Self::new(
            config.min_comment_length,
            config.max_comment_length,
            config.max_paragraphs,
            filter,
        )
    }

    /// Count blank-line separated paragraphs
    pub fn paragraph_count(text: &str) -> usize {
        PARAGRAPH_BREAK
            .split(text)
            .filter(|p| !p.trim().is_empty())
            .count()
    }

    /// Trim `text` and return it if every rule passes
    pub fn check(&self, text: &str) -> Result<String, Rejection> {
        debug!("QualityGate::check: called");
        let text = text.trim();
        let length = text.chars().count();

        if length < self.min_length {
            return Err(Rejection::TooShort {
                length,
                min: self.min_length,
            });
        }
        if length > self.max_length {
            return Err(Rejection::TooLong {
                length,
                max: self.max_length,
            });
        }

        let count = Self::paragraph_count(text);
        if count > self.max_paragraphs {
            return Err(Rejection::TooManyParagraphs {
                count,
                max: self.max_paragraphs,
            });
        }

        if !self.filter.is_acceptable(text) {
            return Err(Rejection::ContentRejected);
        }

        Ok(text.to_string())
    }
}
