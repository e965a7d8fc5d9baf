//! Forum source error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to a forum
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Missing credential: set the {0} environment variable")]
    MissingCredential(String),

    #[error("Reply rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl SourceError {
    /// Whether the failure is likely to clear up on its own (network, 429, 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::RateLimited { .. } => true,
            SourceError::ApiError { status, .. } => *status == 408 || *status >= 500,
            SourceError::Network(_) => true,
            SourceError::Auth(_) => false,
            SourceError::MissingCredential(_) => false,
            SourceError::Rejected(_) => false,
            SourceError::InvalidResponse(_) => false,
        }
    }
}
