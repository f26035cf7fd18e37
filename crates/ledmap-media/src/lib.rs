//! LedMap Media - Frame Sources and Playback
//!
//! This crate feeds frames to the transmitter:
//! - Frame source abstraction with demo sources
//! - DMX recording and replay
//! - Frame pacing without drift
//! - Playback supervision, one session at a time

use thiserror::Error;

pub mod pacer;
pub mod replay;
pub mod source;
pub mod supervisor;

pub use pacer::FramePacer;
pub use replay::{DmxRecorder, DmxRecording, ReplaySource};
pub use source::{ColorSweepSource, FrameSequence, FrameSource, SourceFrame};
pub use supervisor::{
    PlaybackEvent, PlaybackSession, PlaybackSupervisor, SessionInfo, SessionKind,
    SessionSettings, SessionState,
};

/// Media errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recording format error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Core(#[from] ledmap_core::CoreError),

    #[error(transparent)]
    Control(#[from] ledmap_control::ControlError),
}

/// Result type for media operations
pub type Result<T> = std::result::Result<T, MediaError>;
