//! Error types for apicheck

use thiserror::Error;

/// Result type alias using the apicheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// apicheck error types
///
/// Every variant fails the current scenario only. Nothing here is retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No configuration value found for {0}")]
    MissingProperty(String),

    #[error("No configuration property found for value {0}")]
    UnresolvableReference(String),

    #[error("Unknown Key {0}, cannot generate value")]
    UnknownResolver(String),

    #[error("Malformed placeholder: {0}")]
    MalformedPlaceholder(String),

    #[error("JSON Path {0} not found in document")]
    PathNotFound(String),

    #[error("Value at {path} must be {expected}")]
    InvalidType { path: String, expected: String },

    #[error("Invalid JSON Path: {0}")]
    InvalidPath(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// True for the configuration family of errors (missing keys, bad URLs,
    /// malformed tables).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::MissingProperty(_))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Configuration(format!("Invalid URL: {e}"))
    }
}
