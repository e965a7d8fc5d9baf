//! Reddit API client
//!
//! Uses the OAuth2 password grant (script apps) and the `oauth.reddit.com`
//! endpoints. Tokens are cached until shortly before they expire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ForumSource, SourceError};
use crate::config::RedditConfig;
use crate::domain::{Item, PostedReply};

/// Refresh the token this long before Reddit says it expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Longest token lifetime honoured, whatever the server claims
const MAX_TOKEN_LIFETIME_SECS: u64 = 7 * 86_400;

/// Fallback wait when a 429 carries no usable header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Script-app credentials for the password grant
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RedditCredentials {
    /// Read credentials from the environment variables named in config
    pub fn from_env(config: &RedditConfig) -> Result<Self, SourceError> {
        let read = |var: &str| std::env::var(var).map_err(|_| SourceError::MissingCredential(var.to_string()));
        Ok(Self {
            client_id: read(&config.client_id_env)?,
            client_secret: read(&config.client_secret_env)?,
            username: read(&config.username_env)?,
            password: read(&config.password_env)?,
        })
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Reddit implementation of [`ForumSource`]
pub struct RedditClient {
    http: Client,
    credentials: RedditCredentials,
    auth_url: String,
    api_base: String,
    web_base: String,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    /// Create a client from config, reading credentials from the environment
    pub fn from_config(config: &RedditConfig) -> Result<Self, SourceError> {
        debug!(api_base = %config.api_base, "RedditClient::from_config: called");
        let credentials = RedditCredentials::from_env(config)?;
        Self::new(config, credentials)
    }

    /// Create a client with explicit credentials
    pub fn new(config: &RedditConfig, credentials: RedditCredentials) -> Result<Self, SourceError> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(SourceError::Network)?;

        Ok(Self {
            http,
            credentials,
            auth_url: config.auth_url.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            web_base: config.web_base.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    /// Get a bearer token, fetching a new one when the cached one is stale
    async fn access_token(&self) -> Result<String, SourceError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN
        {
            return Ok(token.value.clone());
        }

        debug!("RedditClient::access_token: requesting new token");
        let response = self
            .http
            .post(&self.auth_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(SourceError::Auth(format!("token endpoint returned {}", status)));
        }
        let response = check_status(response).await?;

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
        let token = parse_token(body)?;

        info!(username = %self.credentials.username, "Obtained Reddit access token");
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Attach the bearer token and send, mapping error statuses
    async fn send(&self, request: RequestBuilder) -> Result<Response, SourceError> {
        let token = self.access_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status().as_u16();
        if status == 401 {
            // Token revoked or expired early; force a refresh next call
            *self.token.lock().await = None;
            return Err(SourceError::Auth("access token rejected".to_string()));
        }
        check_status(response).await
    }
}

#[async_trait]
impl ForumSource for RedditClient {
    async fn list_hot_items(&self, source: &str, limit: u32) -> Result<Vec<Item>, SourceError> {
        debug!(%source, limit, "RedditClient::list_hot_items: called");
        let url = format!("{}/r/{}/hot", self.api_base, source);
        let limit = limit.to_string();
        let response = self
            .send(self.http.get(&url).query(&[("limit", limit.as_str()), ("raw_json", "1")]))
            .await?;

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
        let items = listing_to_items(listing, source, &self.web_base);
        debug!(%source, count = items.len(), "RedditClient::list_hot_items: listed");
        Ok(items)
    }

    async fn post_reply(&self, item: &Item, text: &str) -> Result<PostedReply, SourceError> {
        debug!(item_id = %item.id, len = text.len(), "RedditClient::post_reply: called");
        let url = format!("{}/api/comment", self.api_base);
        let thing_id = format!("t3_{}", item.id);
        let response = self
            .send(
                self.http
                    .post(&url)
                    .form(&[("api_type", "json"), ("thing_id", thing_id.as_str()), ("text", text)]),
            )
            .await?;

        let body: CommentResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
        let reply = parse_comment_response(body)?;
        debug!(item_id = %item.id, reply_id = %reply.id, "RedditClient::post_reply: accepted");
        Ok(reply)
    }
}

/// Map non-success statuses to errors, passing successful responses through
async fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .or_else(|| response.headers().get("x-ratelimit-reset"))
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(|secs| secs.ceil() as u64)
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        warn!(retry_after, "Reddit rate limited request");
        return Err(SourceError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    let message = response.text().await.unwrap_or_default();
    debug!(status, "check_status: API error");
    Err(SourceError::ApiError { status, message })
}

fn parse_token(body: TokenResponse) -> Result<AccessToken, SourceError> {
    if let Some(error) = body.error {
        return Err(SourceError::Auth(error));
    }
    let value = body
        .access_token
        .ok_or_else(|| SourceError::InvalidResponse("token response without access_token".to_string()))?;
    let expires_in = body.expires_in.unwrap_or(3600).min(MAX_TOKEN_LIFETIME_SECS);
    Ok(AccessToken {
        value,
        expires_at: Instant::now() + Duration::from_secs(expires_in),
    })
}

/// Convert a listing into items, dropping stickied posts and bad timestamps
fn listing_to_items(listing: Listing, source: &str, web_base: &str) -> Vec<Item> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| child.data)
        .filter(|post| !post.stickied)
        .filter_map(|post| {
            let created_at = DateTime::<Utc>::from_timestamp_millis((post.created_utc * 1000.0) as i64);
            if created_at.is_none() {
                warn!(id = %post.id, created_utc = post.created_utc, "Skipping post with invalid timestamp");
            }
            Some(Item {
                id: post.id,
                source: source.to_string(),
                title: post.title,
                body: post.selftext,
                created_at: created_at?,
                score: post.score,
                permalink: format!("{}{}", web_base, post.permalink),
            })
        })
        .collect()
}

fn parse_comment_response(body: CommentResponse) -> Result<PostedReply, SourceError> {
    if !body.json.errors.is_empty() {
        let errors: Vec<String> = body.json.errors.iter().map(|e| e.to_string()).collect();
        return Err(SourceError::Rejected(errors.join("; ")));
    }

    body.json
        .data
        .and_then(|data| data.things.into_iter().next())
        .map(|thing| PostedReply { id: thing.data.id })
        .ok_or_else(|| SourceError::InvalidResponse("comment response without created thing".to_string()))
}

// Reddit API response types

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
    score: i64,
    permalink: String,
    #[serde(default)]
    stickied: bool,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    json: CommentJson,
}

#[derive(Debug, Deserialize)]
struct CommentJson {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    data: Option<CommentData>,
}

#[derive(Debug, Deserialize)]
struct CommentData {
    things: Vec<CommentThing>,
}

#[derive(Debug, Deserialize)]
struct CommentThing {
    data: CommentThingData,
}

#[derive(Debug, Deserialize)]
struct CommentThingData {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_listing_to_items() {
        let json = r#"{
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {
                        "id": "sticky1", "title": "Weekly thread", "selftext": "",
                        "created_utc": 1717000000.0, "score": 500,
                        "permalink": "/r/rust/comments/sticky1/weekly/", "stickied": true
                    }},
                    {"kind": "t3", "data": {
                        "id": "abc123", "title": "Lifetimes in async", "selftext": "How do I...",
                        "created_utc": 1717000000.0, "score": 42,
                        "permalink": "/r/rust/comments/abc123/lifetimes/"
                    }}
                ]
            }
        }"#;

        let listing: Listing = serde_json::from_str(json).unwrap();
        let items = listing_to_items(listing, "rust", "https://reddit.com");

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, "abc123");
        assert_eq!(item.source, "rust");
        assert_eq!(item.body, "How do I...");
        assert_eq!(item.score, 42);
        assert_eq!(item.created_at, Utc.timestamp_opt(1717000000, 0).unwrap());
        assert_eq!(item.permalink, "https://reddit.com/r/rust/comments/abc123/lifetimes/");
    }

    #[test]
    fn test_parse_comment_response_success() {
        let json = r#"{"json": {"errors": [], "data": {"things": [
            {"kind": "t1", "data": {"id": "kx9z2", "name": "t1_kx9z2"}}
        ]}}}"#;
        let body: CommentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parse_comment_response(body).unwrap(), PostedReply { id: "kx9z2".to_string() });
    }

    #[test]
    fn test_parse_comment_response_errors() {
        let json = r#"{"json": {"errors": [["THREAD_LOCKED", "that thread is locked", "parent"]]}}"#;
        let body: CommentResponse = serde_json::from_str(json).unwrap();
        let err = parse_comment_response(body).unwrap_err();
        assert!(matches!(err, SourceError::Rejected(ref msg) if msg.contains("THREAD_LOCKED")));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_token() {
        let body: TokenResponse =
            serde_json::from_str(r#"{"access_token": "tok", "token_type": "bearer", "expires_in": 86400}"#).unwrap();
        let token = parse_token(body).unwrap();
        assert_eq!(token.value, "tok");
        assert!(token.expires_at > Instant::now() + Duration::from_secs(86000));

        let body: TokenResponse = serde_json::from_str(r#"{"error": "invalid_grant"}"#).unwrap();
        assert!(matches!(parse_token(body), Err(SourceError::Auth(ref e)) if e == "invalid_grant"));
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = RedditCredentials {
            client_id: "id".to_string(),
            client_secret: "very-secret".to_string(),
            username: "bot".to_string(),
            password: "hunter2".to_string(),
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("very-secret"));
        assert!(!shown.contains("hunter2"));
    }
}
