//! Prompt Loader
//!
//! Loads the comment prompt template from a file or falls back to the
//! embedded default.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;
use crate::llm::LlmError;

const COMMENT_TEMPLATE: &str = "comment-user";

/// Context for rendering the comment prompt
#[derive(Debug, Clone, Serialize)]
pub struct CommentPromptContext {
    pub title: String,
    pub body: String,
    pub url: String,
    pub min_length: usize,
    pub max_length: usize,
    pub max_paragraphs: usize,
}

/// Prompts are plain text, so values are inserted without HTML escaping
fn plain_text_engine() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override file (`llm.prompt-template`)
    template_path: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that reads `template_path` when one is configured
    pub fn new(template_path: Option<&Path>) -> Self {
        debug!(?template_path, "PromptLoader::new: called");
        Self {
            hbs: plain_text_engine(),
            template_path: template_path.map(Path::to_path_buf),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self::new(None)
    }

    /// Load the comment template
    ///
    /// A configured path that cannot be read is an error rather than a silent
    /// fallback, so a typo in config does not go unnoticed.
    fn load_template(&self) -> Result<String, LlmError> {
        if let Some(ref path) = self.template_path {
            debug!(?path, "PromptLoader::load_template: loading user template");
            return std::fs::read_to_string(path)
                .map_err(|e| LlmError::Template(format!("Failed to read prompt {}: {}", path.display(), e)));
        }

        embedded::get_embedded(COMMENT_TEMPLATE)
            .map(str::to_string)
            .ok_or_else(|| LlmError::Template(format!("Prompt template not found: {}", COMMENT_TEMPLATE)))
    }

    /// Render the comment prompt for one post
    pub fn render_comment(&self, context: &CommentPromptContext) -> Result<String, LlmError> {
        let template = self.load_template()?;
        info!(url = %context.url, "Rendering comment prompt");

        self.hbs
            .render_template(&template, context)
            .map_err(|e| LlmError::Template(format!("Failed to render template {}: {}", COMMENT_TEMPLATE, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn context() -> CommentPromptContext {
        CommentPromptContext {
            title: "How do transformers scale?".to_string(),
            body: "Asking for a friend".to_string(),
            url: "https://reddit.com/r/MachineLearning/comments/x1".to_string(),
            min_length: 100,
            max_length: 500,
            max_paragraphs: 4,
        }
    }

    #[test]
    fn test_render_embedded() {
        let loader = PromptLoader::embedded_only();
        let prompt = loader.render_comment(&context()).unwrap();
        assert!(prompt.contains("Post Title: How do transformers scale?"));
        assert!(prompt.contains("Post URL: https://reddit.com/r/MachineLearning/comments/x1"));
        assert!(prompt.contains("between 100 and 500 characters"));
        assert!(prompt.contains("1-4 clear paragraphs"));
    }

    #[test]
    fn test_render_does_not_html_escape() {
        let mut ctx = context();
        ctx.title = "Why doesn't x < y hold?".to_string();
        let prompt = PromptLoader::embedded_only().render_comment(&ctx).unwrap();
        assert!(prompt.contains("Post Title: Why doesn't x < y hold?"));
    }

    #[test]
    fn test_render_user_template() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Reply to '{{{{title}}}}' in under {{{{max_length}}}} chars").unwrap();

        let loader = PromptLoader::new(Some(file.path()));
        let prompt = loader.render_comment(&context()).unwrap();
        assert_eq!(prompt, "Reply to 'How do transformers scale?' in under 500 chars");
    }

    #[test]
    fn test_missing_user_template_is_error() {
        let loader = PromptLoader::new(Some(Path::new("/nonexistent/replybot/prompt.hbs")));
        assert!(matches!(
            loader.render_comment(&context()),
            Err(LlmError::Template(_))
        ));
    }
}
