//! Error types for the ingestion pipeline.
//!
//! Errors are split by concern so callers can tell recoverable, per-item
//! failures ([`FetchError`], [`FeedError`], [`ExtractError`]) apart from the
//! configuration problems that abort a run before it starts ([`ConfigError`]).

use std::io;
use thiserror::Error;

/// A single outbound HTTP request failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    /// Convert a reqwest error, keeping timeouts distinguishable.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Whether another attempt against the same URL could succeed.
    ///
    /// Timeouts, connection failures, `429 Too Many Requests` and server
    /// errors are transient. Any other status is final.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Fetching or parsing a keyword search feed failed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("search term is empty")]
    EmptyTerm,

    #[error("invalid feed search URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed feed: {0}")]
    Parse(String),
}

/// Content extraction produced no publishable article.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("content insufficient: {char_count} chars in {paragraph_count} paragraphs")]
    ContentInsufficient {
        char_count: usize,
        paragraph_count: usize,
    },
}

/// Invalid configuration. Always fatal for the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("keyword list is empty")]
    EmptyKeywords,

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("invalid boilerplate pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("failed to read config file: {0}")]
    Read(#[from] io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Persisting or loading the signature ledger failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("signature store I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("signature store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
