//! Error types for configuration and mapping
use thiserror::Error;

/// Core errors
///
/// Everything here is a configuration-class failure: it is raised while
/// loading or validating input, before any output session exists.
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Unsupported file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid or unusable points document
    #[error("Invalid points document: {0}")]
    InvalidPoints(String),

    /// Unknown channel order name
    #[error("Unknown channel order: {0}")]
    UnknownChannelOrder(String),

    /// Frame data does not match its declared dimensions
    #[error("Frame size mismatch: expected {expected} bytes, got {actual} bytes")]
    FrameSizeMismatch {
        /// Expected frame size in bytes
        expected: usize,
        /// Actual frame size in bytes
        actual: usize,
    },
}

impl CoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates an invalid points error.
    pub fn invalid_points(msg: impl Into<String>) -> Self {
        Self::InvalidPoints(msg.into())
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
