//! Embedded fallback prompts
//!
//! Compiled into the binary and used when no template file is configured.

/// User prompt for writing a reply to one forum post
pub const COMMENT_USER: &str = r#"Post Title: {{title}}
Post Content: {{body}}
Post URL: {{url}}

Write a thoughtful, helpful comment that:
1. Is structured in 1-{{max_paragraphs}} clear paragraphs
2. Includes at least one practical tip or recommendation
3. Makes complex ideas accessible through analogies or examples
4. Addresses the specific needs or questions in the post
5. Is between {{min_length}} and {{max_length}} characters
6. Maintains a warm, engaging tone while being informative

Focus on being genuinely helpful to the original poster while making connections to broader AI/ML concepts.

Comment:"#;

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "comment-user" => Some(COMMENT_USER),
        _ => None,
    }
}
