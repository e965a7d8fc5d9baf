//! replybot configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::SchedulerConfig;

/// Upper bound for every hour-valued window: a little over a year
pub const MAX_WINDOW_HOURS: f64 = 24.0 * 366.0;

fn check_hours(key: &str, value: f64, allow_zero: bool) -> Result<()> {
    let lower_ok = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if !(lower_ok && value <= MAX_WINDOW_HOURS) {
        let lower = if allow_zero { "0" } else { "greater than 0" };
        return Err(eyre::eyre!(
            "{} must be between {} and {} hours, got {}",
            key,
            lower,
            MAX_WINDOW_HOURS,
            value
        ));
    }
    Ok(())
}

/// Main replybot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rate limits
    pub policy: PolicyConfig,

    /// Candidate selection
    pub selection: SelectionConfig,

    /// Generated comment constraints
    pub content: ContentConfig,

    /// Scheduler timing
    pub scheduler: SchedulerConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Reddit API configuration
    pub reddit: RedditConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Check that limits and bounds make sense
    pub fn validate(&self) -> Result<()> {
        if self.policy.max_actions_per_day == 0 {
            return Err(eyre::eyre!("policy.max-actions-per-day must be at least 1"));
        }
        check_hours("policy.min-interval-hours", self.policy.min_interval_hours, true)?;
        if self.selection.sources.is_empty() {
            return Err(eyre::eyre!("selection.sources must list at least one source"));
        }
        if self.selection.page_size == 0 {
            return Err(eyre::eyre!("selection.page-size must be at least 1"));
        }
        check_hours("selection.max-item-age-hours", self.selection.max_item_age_hours, false)?;
        if self.content.min_comment_length > self.content.max_comment_length {
            return Err(eyre::eyre!(
                "content.min-comment-length ({}) exceeds content.max-comment-length ({})",
                self.content.min_comment_length,
                self.content.max_comment_length
            ));
        }
        check_hours("scheduler.interval-hours", self.scheduler.interval_hours, false)?;
        if self.scheduler.poll_secs == 0 {
            return Err(eyre::eyre!("scheduler.poll-secs must be at least 1"));
        }
        Ok(())
    }

    /// Check that every credential environment variable is set
    ///
    /// Only needed by commands that talk to the forum or the LLM.
    pub fn validate_credentials(&self) -> Result<()> {
        let required = [
            &self.llm.api_key_env,
            &self.reddit.client_id_env,
            &self.reddit.client_secret_env,
            &self.reddit.username_env,
            &self.reddit.password_env,
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|var| std::env::var(var.as_str()).is_err())
            .map(|var| var.as_str())
            .collect();

        if !missing.is_empty() {
            return Err(eyre::eyre!(
                "Missing credentials. Set the environment variables: {}",
                missing.join(", ")
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .replybot.yml
        let local_config = PathBuf::from(".replybot.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/replybot/replybot.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("replybot").join("replybot.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Converts fractional hours into a chrono duration
fn hours(h: f64) -> chrono::Duration {
    chrono::Duration::try_milliseconds((h * 3_600_000.0).round() as i64).unwrap_or(chrono::Duration::MAX)
}

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Maximum actions per calendar day (UTC)
    #[serde(rename = "max-actions-per-day")]
    pub max_actions_per_day: u32,

    /// Minimum spacing between consecutive actions
    #[serde(rename = "min-interval-hours")]
    pub min_interval_hours: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_actions_per_day: 6,
            min_interval_hours: 4.0,
        }
    }
}

impl PolicyConfig {
    pub fn min_interval(&self) -> chrono::Duration {
        hours(self.min_interval_hours)
    }
}

/// Candidate selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Sources to scan, highest priority first
    pub sources: Vec<String>,

    /// Number of hot items requested per source
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Items older than this are skipped
    #[serde(rename = "max-item-age-hours")]
    pub max_item_age_hours: f64,

    /// Items scoring below this are skipped
    #[serde(rename = "min-item-score")]
    pub min_item_score: i64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            sources: [
                "artificial",
                "MachineLearning",
                "AIdev",
                "OpenAI",
                "ChatGPT",
                "GPT3",
                "GPT4",
                "StableDiffusion",
                "dalle2",
                "midjourney",
                "learnmachinelearning",
                "datascience",
                "computervision",
                "nlp",
                "deeplearning",
                "reinforcementlearning",
                "tensorflow",
                "pytorch",
                "MLQuestions",
                "AIethics",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            page_size: 20,
            max_item_age_hours: 24.0,
            min_item_score: 10,
        }
    }
}

impl SelectionConfig {
    pub fn max_item_age(&self) -> chrono::Duration {
        hours(self.max_item_age_hours)
    }
}

/// Constraints on generated comments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Minimum comment length in characters
    #[serde(rename = "min-comment-length")]
    pub min_comment_length: usize,

    /// Maximum comment length in characters
    #[serde(rename = "max-comment-length")]
    pub max_comment_length: usize,

    /// Maximum number of blank-line separated paragraphs
    #[serde(rename = "max-paragraphs")]
    pub max_paragraphs: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_comment_length: 100,
            max_comment_length: 500,
            max_paragraphs: 4,
        }
    }
}

/// Default persona for generated comments
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI/ML practitioner who writes thoughtful, accessible forum replies. \
Write in a warm, engaging tone that makes complex ideas approachable. Always include at least one practical tip, \
recommendation or actionable insight. Use analogies and real-world examples, acknowledge both strengths and \
limitations of ideas, and explain jargon when you use it. Connect the post to broader AI/ML concepts where it helps. \
Write in clear English, in one to four short paragraphs, and be genuinely helpful to the original poster.";

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// System prompt describing the commenting style
    #[serde(rename = "system-prompt")]
    pub system_prompt: String,

    /// Optional Handlebars template file overriding the embedded user prompt
    #[serde(rename = "prompt-template")]
    pub prompt_template: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 400,
            temperature: 0.7,
            timeout_ms: 120_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prompt_template: None,
        }
    }
}

/// Reddit API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    /// Environment variable containing the OAuth client id
    #[serde(rename = "client-id-env")]
    pub client_id_env: String,

    /// Environment variable containing the OAuth client secret
    #[serde(rename = "client-secret-env")]
    pub client_secret_env: String,

    /// Environment variable containing the account username
    #[serde(rename = "username-env")]
    pub username_env: String,

    /// Environment variable containing the account password
    #[serde(rename = "password-env")]
    pub password_env: String,

    /// User agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// OAuth token endpoint
    #[serde(rename = "auth-url")]
    pub auth_url: String,

    /// Base URL for authenticated API calls
    #[serde(rename = "api-base")]
    pub api_base: String,

    /// Public base URL used to build item permalinks
    #[serde(rename = "web-base")]
    pub web_base: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id_env: "REDDIT_CLIENT_ID".to_string(),
            client_secret_env: "REDDIT_CLIENT_SECRET".to_string(),
            username_env: "REDDIT_USERNAME".to_string(),
            password_env: "REDDIT_PASSWORD".to_string(),
            user_agent: "replybot/0.1 (AI/ML discussion bot)".to_string(),
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
            web_base: "https://reddit.com".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite ledger
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/replybot on Linux)
        let db_path = dirs::data_dir()
            .map(|d| d.join("replybot"))
            .unwrap_or_else(|| PathBuf::from(".replybot"))
            .join("replybot.db");

        Self { db_path }
    }
}
