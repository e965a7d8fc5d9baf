//! Heuristic English detection
//!
//! No model, no network: the text must be written mostly in ASCII letters,
//! and longer texts must contain a fair share of common English function
//! words.

use tracing::debug;

use super::ContentFilter;

/// Minimum share of letters that must be ASCII
const MIN_ASCII_LETTER_RATIO: f64 = 0.9;

/// Texts shorter than this many words skip the function word check
const MIN_WORDS_FOR_VOCAB_CHECK: usize = 8;

/// Minimum share of words that must be function words
const MIN_FUNCTION_WORD_RATIO: f64 = 0.15;

const FUNCTION_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be", "because", "been",
    "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "he", "her", "here",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "my", "no", "not",
    "of", "on", "or", "our", "out", "she", "so", "some", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "to", "up", "us", "very", "was", "we", "were", "what", "when",
    "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

/// Accepts text that looks like English
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishFilter;

impl EnglishFilter {
    pub fn new() -> Self {
        Self
    }

    fn ascii_letter_ratio(text: &str) -> Option<f64> {
        let (letters, ascii) = text
            .chars()
            .filter(|c| c.is_alphabetic())
            .fold((0usize, 0usize), |(n, a), c| (n + 1, a + usize::from(c.is_ascii())));
        (letters > 0).then(|| ascii as f64 / letters as f64)
    }

    fn function_word_ratio(words: &[String]) -> f64 {
        let hits = words.iter().filter(|w| FUNCTION_WORDS.contains(&w.as_str())).count();
        hits as f64 / words.len() as f64
    }
}

impl ContentFilter for EnglishFilter {
    fn is_acceptable(&self, text: &str) -> bool {
        let Some(ascii_ratio) = Self::ascii_letter_ratio(text) else {
            debug!("EnglishFilter::is_acceptable: no letters");
            return false;
        };
        if ascii_ratio < MIN_ASCII_LETTER_RATIO {
            debug!(ascii_ratio, "EnglishFilter::is_acceptable: too many non-ASCII letters");
            return false;
        }

        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                    .to_lowercase()
            })
            .filter(|w| w.chars().any(char::is_alphabetic))
            .collect();

        if words.len() >= MIN_WORDS_FOR_VOCAB_CHECK {
            let ratio = Self::function_word_ratio(&words);
            if ratio < MIN_FUNCTION_WORD_RATIO {
                debug!(ratio, words = words.len(), "EnglishFilter::is_acceptable: too few function words");
                return false;
            }
        }

        true
    }
}
