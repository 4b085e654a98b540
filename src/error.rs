// src/error.rs

//! Unified error handling for the diary pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed (connection, timeout, body decoding)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Pattern compilation failed
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// The content API answered with a non-success status
    #[error("Notion API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The content API returned an envelope that cannot be continued
    #[error("Malformed pagination envelope: {0}")]
    Pagination(String),

    /// An auxiliary fetch (OGP, oEmbed, image) returned a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Image decoding or encoding failed
    #[error("Image error for {context}: {message}")]
    Image { context: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a pagination error.
    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination(message.into())
    }

    /// Create a selector error.
    pub fn selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Create an image error with context.
    pub fn image(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Image {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error comes from the content API itself.
    ///
    /// These abort the whole ingestion cycle.
    pub fn is_fatal_fetch(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::Pagination(_) | Self::Http(_))
    }
}
