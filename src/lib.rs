//! Doc-Mirror: a documentation site mirror
//!
//! This crate crawls a documentation website from a base URL, downloads its
//! in-domain pages (and optionally their assets) with bounded concurrency and
//! retry/backoff, and converts every page into Markdown, cleaned HTML, plain
//! text or a structured JSON document while mirroring the site's path layout
//! on disk.

pub mod config;
pub mod crawler;
pub mod format;
pub mod output;
pub mod state;
pub mod url;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Doc-Mirror operations
///
/// Only configuration-level problems surface through this type. Failures of
/// individual URLs are recorded in the crawl session and never abort a run.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid base URL '{url}': {source}")]
    InvalidBaseUrl { url: String, source: UrlError },

    #[error("Output directory {} is not accessible: {source}", path.display())]
    OutputRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid proxy for '{scheme}': {message}")]
    InvalidProxy { scheme: String, message: String },
}

/// URL-specific errors
///
/// Every variant is a reject signal from the normalizer: the URL is excluded
/// from the frontier and never counted as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Skipped non-navigable reference: {0}")]
    Skipped(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Errors of a single fetch attempt
///
/// The retry policy decides from the variant whether another attempt is made.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0} Not Found")]
    NotFound(u16),

    #[error("HTTP 429 Too Many Requests")]
    RateLimited { retry_after: Option<Duration> },

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else {
            Self::Request(error)
        }
    }
}

/// Errors raised inside a formatter
///
/// These never leave [`format::Formatter::convert`]; the formatter degrades
/// to plain text instead.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("HTML rewriting failed: {0}")]
    Rewrite(#[from] lol_html::errors::RewritingError),

    #[error("Converter panicked")]
    Panicked,
}

/// Result type alias for Doc-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, OutputFormat};
pub use crawler::{Coordinator, CrawlOutcome};
pub use format::{Formatter, FormatterConfig};
pub use state::{CrawlStatus, PageState};
pub use url::{normalize_url, PathMapper};
