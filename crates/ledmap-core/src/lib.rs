//! LedMap Core - Configuration, Point Mapping and Color
//!
//! This crate contains everything that happens before bytes reach the wire:
//! - Typed configuration with load-time validation
//! - Point mapping from canvas coordinates to DMX universes
//! - Color correction and white-channel extraction
//! - Fixture channel ordering
//! - Sampling RGB frames into flat DMX frames

pub mod channel_order;
pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod points;

pub use channel_order::{ChannelOrder, ChannelOrderMap};
pub use color::{ColorCorrector, RgbBatch};
pub use config::{
    BitDepth, ColorConfig, DeltaEncodingConfig, LedConfig, LedType, PlaybackConfig, WhiteConfig,
    WhiteMethod, WhiteMode, ARTNET_PORT,
};
pub use error::{CoreError, Result};
pub use frame::{FrameRenderer, RgbFrame};
pub use logging::LogConfig;
pub use points::{
    load_points, BoundaryShift, Canvas, CanvasPoint, MappingOptions, ObjectSpan, Point,
    PointLayout, PointMapper, PointMapping, PointObject, PointsDocument,
};
