//! DMX output system
//!
//! This module provides DMX512 output via Art-Net.
//!
//! ## Art-Net
//!
//! Art-Net is a UDP protocol for DMX transmission over Ethernet.
//! - Unicast or broadcast (255.255.255.255:6454)
//! - Supports 32768 universes
//! - Includes sequence numbering
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ledmap_control::dmx::{ArtNetTransmitter, FrameSource, TestPattern, TransmitterConfig};
//! use ledmap_core::LedConfig;
//!
//! # fn main() -> ledmap_control::Result<()> {
//! let config = LedConfig::default();
//! let transmitter = ArtNetTransmitter::with_udp(TransmitterConfig::packed(&config, 200)?)?;
//!
//! // Live frames go out unless something else holds the wire
//! let frame = vec![0u8; 600];
//! assert!(transmitter.send_frame(&frame, FrameSource::Video));
//!
//! // Hold a test pattern, then hand the wire back
//! transmitter.test_pattern(TestPattern::Red)?;
//! assert!(!transmitter.send_frame(&frame, FrameSource::Video));
//! transmitter.resume_video_mode();
//! # Ok(())
//! # }
//! ```

pub mod artnet;
pub mod delta;
pub mod patterns;
pub mod stats;
pub mod transmitter;
pub mod transport;

pub use artnet::{build_artdmx_packet, parse_artdmx, ArtDmx, Universe};
pub use delta::{apply_delta, Delta, DeltaEncoder, EncodedFrame, FrameKind};
pub use patterns::TestPattern;
pub use stats::{NetworkStats, NetworkStatsSnapshot, PACKET_SIZE_ESTIMATE};
pub use transmitter::{
    ArtNetTransmitter, FrameSource, Priority, SessionId, TransmitterConfig, HOLD_INTERVAL,
};
pub use transport::{DmxTransport, UdpTransport};
