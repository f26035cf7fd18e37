//! LedMap Control - Art-Net output
//!
//! This crate puts DMX frames on the wire:
//! - **Art-Net**: ArtDMX packet codec over UDP
//! - **Arbitration**: test patterns beat replay, replay beats live video
//! - **Delta encoding**: full/delta classification of outgoing frames
//! - **Statistics**: lock-free packet and bandwidth counters
//!
//! ## Modules
//!
//! - [`dmx`] - Art-Net transmitter and its parts
//! - [`worker`] - Named threads with bounded joins
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;

/// DMX output (Art-Net)
pub mod dmx;

/// Worker threads
pub mod worker;

// Re-exports
pub use error::{ControlError, Result};

pub use dmx::{
    ArtNetTransmitter, DmxTransport, FrameKind, FrameSource, NetworkStatsSnapshot, Priority,
    SessionId, TestPattern, TransmitterConfig, UdpTransport,
};
pub use worker::Worker;
