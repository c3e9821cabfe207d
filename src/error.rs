//! Error types for the listing engine.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ListingError>;

/// Errors raised by the content, preference and configuration layers.
///
/// Filtering, sorting and URL parsing never fail; only the collaborators
/// that touch disk or the network produce these.
#[derive(Error, Debug)]
pub enum ListingError {
    /// Disk I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport or status failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A base URL or content URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}
