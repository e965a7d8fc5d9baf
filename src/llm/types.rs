//! LLM request/response types
//!
//! Modelled on the chat completions API: a system prompt, a list of
//! role-tagged messages, and a single text completion back.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt describing the persona/style
    pub system_prompt: String,

    /// Conversation messages (a single user message for comment generation)
    pub messages: Vec<Message>,

    /// Max tokens for response
    pub max_tokens: u32,

    /// Sampling temperature, provider default when `None`
    pub temperature: Option<f32>,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        debug!("Message::user: called");
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        debug!("Message::assistant: called");
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Text content (if any)
    pub content: Option<String>,

    /// Why generation stopped
    pub finish_reason: FinishReason,

    /// Token usage
    pub usage: TokenUsage,
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    /// Parse from the chat completions `finish_reason` string
    pub fn from_openai(s: Option<&str>) -> Self {
        match s {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(other) => {
                debug!(%other, "FinishReason::from_openai: unrecognised reason");
                FinishReason::Other(other.to_string())
            }
        }
    }
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn test_message_assistant() {
        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.role.as_str(), "assistant");
    }

    #[test]
    fn test_finish_reason_from_openai() {
        assert_eq!(FinishReason::from_openai(Some("stop")), FinishReason::Stop);
        assert_eq!(FinishReason::from_openai(Some("length")), FinishReason::Length);
        assert_eq!(FinishReason::from_openai(None), FinishReason::Stop);
        assert_eq!(
            FinishReason::from_openai(Some("tool_calls")),
            FinishReason::Other("tool_calls".to_string())
        );
    }
}
