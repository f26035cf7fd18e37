//! RGB frames and per-point rendering into DMX frames

use std::sync::Arc;

use crate::color::{ColorCorrector, RgbBatch};
use crate::error::{CoreError, Result};
use crate::points::PointLayout;

/// Packed RGB24 image, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(CoreError::FrameSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame filled with a single color
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width.max(1) as usize * height.max(1) as usize;
        Self {
            width: width.max(1),
            height: height.max(1),
            data: rgb.repeat(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Turns RGB frames into flat DMX frames for one point layout
///
/// Owns its sample batch and output buffer, so steady-state rendering does
/// not allocate. One renderer belongs to one playback thread.
pub struct FrameRenderer {
    layout: Arc<PointLayout>,
    corrector: ColorCorrector,
    batch: RgbBatch,
    output: Vec<u8>,
}

impl FrameRenderer {
    pub fn new(layout: Arc<PointLayout>, corrector: ColorCorrector) -> Self {
        let points = layout.total_points();
        let frame_len = layout.total_channels;
        Self {
            layout,
            corrector,
            batch: RgbBatch::with_capacity(points),
            output: vec![0; frame_len],
        }
    }

    pub fn layout(&self) -> &Arc<PointLayout> {
        &self.layout
    }

    /// Length of every rendered DMX frame
    pub fn frame_len(&self) -> usize {
        self.output.len()
    }

    /// Sample the color under every point.
    ///
    /// Frames whose size differs from the canvas are sampled nearest-neighbour
    /// in canvas-relative coordinates; points off the canvas read the edge.
    pub fn sample(&mut self, frame: &RgbFrame) -> &RgbBatch {
        let canvas = self.layout.canvas;
        let max_x = frame.width - 1;
        let max_y = frame.height - 1;
        let same_size = frame.width == canvas.width && frame.height == canvas.height;

        self.batch.clear();
        for point in &self.layout.points {
            let x = point.x.max(0) as u64;
            let y = point.y.max(0) as u64;
            let (fx, fy) = if same_size {
                (x, y)
            } else {
                (
                    x * frame.width as u64 / canvas.width as u64,
                    y * frame.height as u64 / canvas.height as u64,
                )
            };
            let [r, g, b] = frame.pixel((fx as u32).min(max_x), (fy as u32).min(max_y));
            self.batch.push(r, g, b);
        }
        &self.batch
    }

    /// Sample, correct and write channels. Gap channels stay zero.
    pub fn render(&mut self, frame: &RgbFrame) -> &[u8] {
        self.sample(frame);
        self.corrector.apply(&mut self.batch);
        self.output.fill(0);
        self.corrector
            .write_channels(&self.batch, &self.layout.mappings, &mut self.output);
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BitDepth, ColorConfig, LedType, WhiteConfig};
    use crate::points::{Canvas, CanvasPoint, MappingOptions, PointMapper, PointObject, PointsDocument};

    fn layout(points: Vec<CanvasPoint>, canvas: (u32, u32)) -> Arc<PointLayout> {
        let document = PointsDocument {
            canvas: Canvas {
                width: canvas.0,
                height: canvas.1,
            },
            objects: vec![PointObject { id: None, points }],
        };
        let mapper = PointMapper::new(MappingOptions {
            channels_per_point: 3,
            channels_per_universe: 510,
            validate_bounds: true,
        })
        .unwrap();
        Arc::new(mapper.map(&document).unwrap())
    }

    fn plain() -> ColorCorrector {
        ColorCorrector::new(
            ColorConfig::default(),
            WhiteConfig::default(),
            LedType::Rgb,
            BitDepth::Eight,
        )
    }

    #[test]
    fn test_frame_size_is_validated() {
        assert!(RgbFrame::new(2, 2, vec![0; 12]).is_ok());
        assert!(matches!(
            RgbFrame::new(2, 2, vec![0; 11]),
            Err(CoreError::FrameSizeMismatch {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn test_render_samples_points_in_order() {
        let layout = layout(
            vec![CanvasPoint { x: 1, y: 0 }, CanvasPoint { x: 0, y: 1 }],
            (2, 2),
        );
        let mut frame = RgbFrame::solid(2, 2, [0, 0, 0]);
        frame.data_mut()[3..6].copy_from_slice(&[10, 20, 30]); // (1, 0)
        frame.data_mut()[6..9].copy_from_slice(&[40, 50, 60]); // (0, 1)

        let mut renderer = FrameRenderer::new(layout, plain());
        assert_eq!(renderer.render(&frame), &[10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_render_scales_mismatched_frames() {
        let layout = layout(vec![CanvasPoint { x: 99, y: 99 }], (100, 100));
        let mut frame = RgbFrame::solid(10, 10, [0, 0, 0]);
        let last = frame.data().len() - 3;
        frame.data_mut()[last..].copy_from_slice(&[7, 8, 9]);

        let mut renderer = FrameRenderer::new(layout, plain());
        assert_eq!(renderer.render(&frame), &[7, 8, 9]);
    }
}
