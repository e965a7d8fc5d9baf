//! Comment generation
//!
//! [`CommentGenerator`] turns a post into reply text. The LLM-backed
//! implementation renders the user prompt from a template and sends it with
//! the configured persona as system prompt. Length and shape rules are not
//! enforced here; the caller runs the result through the quality gate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{ContentConfig, LlmConfig};
use crate::llm::{CompletionRequest, FinishReason, LlmClient, LlmError, Message};
use crate::prompts::{CommentPromptContext, PromptLoader};

/// How replies should be written
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub min_length: usize,
    pub max_length: usize,
    pub max_paragraphs: usize,
}

impl StyleConfig {
    pub fn from_config(llm: &LlmConfig, content: &ContentConfig) -> Self {
        Self {
            system_prompt: llm.system_prompt.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            min_length: content.min_comment_length,
            max_length: content.max_comment_length,
            max_paragraphs: content.max_paragraphs,
        }
    }
}

/// Produces reply text for a post
#[async_trait]
pub trait CommentGenerator: Send + Sync {
    async fn generate(&self, title: &str, body: &str, url: &str, style: &StyleConfig) -> Result<String, LlmError>;
}

/// Generator backed by a chat completion model
pub struct LlmCommentGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
}

impl LlmCommentGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader) -> Self {
        debug!("LlmCommentGenerator::new: called");
        Self { llm, prompts }
    }
}

#[async_trait]
impl CommentGenerator for LlmCommentGenerator {
    async fn generate(&self, title: &str, body: &str, url: &str, style: &StyleConfig) -> Result<String, LlmError> {
        debug!(%url, "LlmCommentGenerator::generate: called");
        let prompt = self.prompts.render_comment(&CommentPromptContext {
            title: title.to_string(),
            body: body.to_string(),
            url: url.to_string(),
            min_length: style.min_length,
            max_length: style.max_length,
            max_paragraphs: style.max_paragraphs,
        })?;

        let response = self
            .llm
            .complete(CompletionRequest {
                system_prompt: style.system_prompt.clone(),
                messages: vec![Message::user(prompt)],
                max_tokens: style.max_tokens,
                temperature: Some(style.temperature),
            })
            .await?;

        if response.finish_reason == FinishReason::Length {
            warn!(output_tokens = response.usage.output_tokens, "Completion hit the token limit");
        }

        // An empty completion is judged by the quality gate like any other short text
        let text = response.content.unwrap_or_default().trim().to_string();
        debug!(chars = text.chars().count(), "LlmCommentGenerator::generate: done");
        Ok(text)
    }
}
