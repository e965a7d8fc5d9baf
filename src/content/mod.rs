//! Content checks
//!
//! [`ContentFilter`] decides whether a piece of text is something the bot
//! should engage with at all (used on candidate posts and generated replies).
//! [`QualityGate`] applies the size and shape rules to generated replies.

mod english;
mod gate;

pub use english::EnglishFilter;
pub use gate::{QualityGate, Rejection};

/// Accept/reject predicate over text
pub trait ContentFilter: Send + Sync {
    fn is_acceptable(&self, text: &str) -> bool;
}

/// Filter that accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ContentFilter for AcceptAll {
    fn is_acceptable(&self, _text: &str) -> bool {
        true
    }
}
