//! Point mapping - canvas points to DMX addresses
//!
//! A points document lists logical objects (strips, panels, letters...) as
//! ordered lists of canvas coordinates. [`PointMapper`] flattens them into a
//! single channel space, packed object after object, with one constraint:
//! no object may straddle the boundary after the first eight universes,
//! because installations typically split there onto a second controller.
//! An object that would cross it is moved as a whole to start exactly on the
//! boundary, leaving a gap at the tail of the previous universe.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::LedConfig;
use crate::error::{CoreError, Result};

/// Universes per controller chunk
pub const UNIVERSES_PER_CHUNK: usize = 8;

/// Canvas dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }
}

/// A raw point as written in the points document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasPoint {
    pub x: i32,
    pub y: i32,
}

/// One logical object: its points are always kept contiguous on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub points: Vec<CanvasPoint>,
}

/// Canvas/points definition file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsDocument {
    pub canvas: Canvas,
    pub objects: Vec<PointObject>,
}

impl PointsDocument {
    /// Parse a JSON points document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: PointsDocument = serde_json::from_str(json)?;
        if document.canvas.width == 0 || document.canvas.height == 0 {
            return Err(CoreError::invalid_points(format!(
                "canvas must have a positive size, got {}x{}",
                document.canvas.width, document.canvas.height
            )));
        }
        Ok(document)
    }

    pub fn point_count(&self) -> usize {
        self.objects.iter().map(|o| o.points.len()).sum()
    }
}

/// Load a points document from disk
pub fn load_points(path: &Path) -> Result<PointsDocument> {
    let json = std::fs::read_to_string(path)?;
    let document = PointsDocument::from_json_str(&json)?;
    tracing::info!(
        "Loaded {} objects / {} points from {:?}",
        document.objects.len(),
        document.point_count(),
        path
    );
    Ok(document)
}

/// A mapped point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    /// Position in the flattened point list
    pub index: usize,
    pub object_index: usize,
    pub x: i32,
    pub y: i32,
}

/// Wire location of a point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointMapping {
    pub universe_index: u16,
    /// First channel inside the universe
    pub channel_offset: u16,
    /// First byte inside the flat DMX frame
    pub frame_offset: usize,
}

/// Channel range occupied by one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectSpan {
    pub object_index: usize,
    pub start: usize,
    pub end: usize,
}

/// Record of the one object moved onto the chunk boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryShift {
    pub object_index: usize,
    pub boundary: usize,
    /// Unused channels left before the boundary
    pub gap: usize,
}

/// Packing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingOptions {
    pub channels_per_point: usize,
    pub channels_per_universe: usize,
    /// Drop points outside the canvas. Preview contexts turn this off.
    pub validate_bounds: bool,
}

impl MappingOptions {
    pub fn from_config(config: &LedConfig) -> Self {
        Self {
            channels_per_point: config.channels_per_point(),
            channels_per_universe: config.channels_per_universe(),
            validate_bounds: true,
        }
    }

    /// Channel index of the chunk boundary
    pub fn chunk_boundary(&self) -> usize {
        UNIVERSES_PER_CHUNK * self.channels_per_universe
    }
}

/// Result of mapping a points document
#[derive(Debug, Clone)]
pub struct PointLayout {
    pub canvas: Canvas,
    pub options: MappingOptions,
    pub points: Vec<Point>,
    pub mappings: Vec<PointMapping>,
    pub objects: Vec<ObjectSpan>,
    pub boundary_shift: Option<BoundaryShift>,
    pub dropped_points: usize,
    pub total_channels: usize,
    pub required_universes: usize,
}

impl PointLayout {
    pub fn total_points(&self) -> usize {
        self.points.len()
    }

    /// Points paired with their wire locations
    pub fn iter(&self) -> impl Iterator<Item = (&Point, &PointMapping)> {
        self.points.iter().zip(self.mappings.iter())
    }
}

/// Assigns every point a stable universe/channel pair
#[derive(Debug, Clone)]
pub struct PointMapper {
    options: MappingOptions,
}

impl PointMapper {
    pub fn new(options: MappingOptions) -> Result<Self> {
        if options.channels_per_point == 0 {
            return Err(CoreError::invalid_config("channels_per_point must be > 0"));
        }
        if options.channels_per_universe < options.channels_per_point
            || options.channels_per_universe > 512
        {
            return Err(CoreError::invalid_config(format!(
                "channels_per_universe {} cannot hold a {}-channel point",
                options.channels_per_universe, options.channels_per_point
            )));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &MappingOptions {
        &self.options
    }

    /// Flatten `document` into a channel layout.
    ///
    /// Re-run after every reload or canvas change; the layout is immutable.
    pub fn map(&self, document: &PointsDocument) -> Result<PointLayout> {
        let canvas = document.canvas;
        let cpp = self.options.channels_per_point;
        let cpu = self.options.channels_per_universe;
        let boundary = self.options.chunk_boundary();
        let keep = |p: &CanvasPoint| !self.options.validate_bounds || canvas.contains(p.x, p.y);

        let capacity = document.point_count();
        let mut points = Vec::with_capacity(capacity);
        let mut mappings = Vec::with_capacity(capacity);
        let mut objects = Vec::with_capacity(document.objects.len());
        let mut boundary_shift = None;
        let mut dropped_points = 0;
        let mut cursor = 0usize;

        for (object_index, object) in document.objects.iter().enumerate() {
            let kept = object.points.iter().filter(|p| keep(p)).count();
            dropped_points += object.points.len() - kept;
            if kept == 0 {
                continue;
            }

            let span = kept * cpp;
            if cursor < boundary && cursor + span > boundary {
                let gap = boundary - cursor;
                tracing::debug!(
                    "Object {} ({} channels at {}) would straddle channel {}, shifting by {}",
                    object_index,
                    span,
                    cursor,
                    boundary,
                    gap
                );
                boundary_shift = Some(BoundaryShift {
                    object_index,
                    boundary,
                    gap,
                });
                cursor = boundary;
            }

            let start = cursor;
            for p in object.points.iter().filter(|p| keep(p)) {
                points.push(Point {
                    index: points.len(),
                    object_index,
                    x: p.x,
                    y: p.y,
                });
                let universe_index = u16::try_from(cursor / cpu).map_err(|_| {
                    CoreError::invalid_points(format!(
                        "point {} needs universe {}, beyond the addressable range",
                        points.len() - 1,
                        cursor / cpu
                    ))
                })?;
                mappings.push(PointMapping {
                    universe_index,
                    // Always below `cpu`, which is at most 512
                    channel_offset: (cursor % cpu) as u16,
                    frame_offset: cursor,
                });
                cursor += cpp;
            }
            objects.push(ObjectSpan {
                object_index,
                start,
                end: cursor,
            });
        }

        if dropped_points > 0 {
            tracing::warn!(
                "Dropped {} points outside the {}x{} canvas",
                dropped_points,
                canvas.width,
                canvas.height
            );
        }
        if points.is_empty() {
            return Err(CoreError::invalid_points("no points inside the canvas"));
        }

        let total_channels = cursor;
        let required_universes = total_channels.div_ceil(cpu);
        tracing::info!(
            "Mapped {} points to {} channels across {} universes",
            points.len(),
            total_channels,
            required_universes
        );

        Ok(PointLayout {
            canvas,
            options: self.options,
            points,
            mappings,
            objects,
            boundary_shift,
            dropped_points,
            total_channels,
            required_universes,
        })
    }
}
