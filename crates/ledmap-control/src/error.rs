//! Error types for the output system
use thiserror::Error;

/// Output system errors
///
/// Only construction and configuration can fail. Once a transmitter is
/// running, send failures are logged and counted instead of returned.
#[derive(Error, Debug)]
pub enum ControlError {
    /// DMX error
    #[error("DMX error: {0}")]
    DmxError(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error from the core crate
    #[error(transparent)]
    Core(#[from] ledmap_core::CoreError),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unknown test pattern name
    #[error("Unknown test pattern: {0}")]
    UnknownPattern(String),

    /// Thread could not be spawned
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),
}

/// Result type for output operations
pub type Result<T> = std::result::Result<T, ControlError>;
