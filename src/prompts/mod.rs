//! Prompt Template System
//!
//! Renders the user prompt sent with every comment request.
//!
//! Template loading chain:
//! 1. `llm.prompt-template` file from config (user override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{CommentPromptContext, PromptLoader};
