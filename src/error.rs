//! Error types for Signova

use thiserror::Error;

/// Result type alias for Signova operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Signova client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Camera unavailable or failed
    #[error("camera error: {0}")]
    Camera(String),

    /// Frame capture or encoding error
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech recognition error
    #[error("voice error: {0}")]
    Voice(String),

    /// Prediction or GIF service error
    #[error("service error: {0}")]
    Service(String),

    /// Request exceeded its deadline
    #[error("timed out: {0}")]
    Timeout(String),

    /// Operation cancelled before it completed
    #[error("cancelled")]
    Cancelled,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Image decoding or encoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid URL
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}
