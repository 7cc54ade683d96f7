//! Error types for CardForge

use thiserror::Error;

/// The main error type for CardForge operations
#[derive(Debug, Error)]
pub enum CardForgeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(String),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Could not determine image dimensions for {0}")]
    DimensionError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Batch is already running")]
    AlreadyRunning,

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task has no generated image: {0}")]
    NotGenerated(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Style error: {0}")]
    StyleError(String),
}

/// Result type alias for CardForge operations
pub type Result<T> = std::result::Result<T, CardForgeError>;

impl From<serde_json::Error> for CardForgeError {
    fn from(err: serde_json::Error) -> Self {
        CardForgeError::JsonError(err.to_string())
    }
}

impl From<toml::de::Error> for CardForgeError {
    fn from(err: toml::de::Error) -> Self {
        CardForgeError::TomlParseError(err.to_string())
    }
}

impl From<image::ImageError> for CardForgeError {
    fn from(err: image::ImageError) -> Self {
        CardForgeError::ImageError(err.to_string())
    }
}
