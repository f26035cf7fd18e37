//! Frame sources
//!
//! Decoders and generators live outside this workspace; they plug in through
//! [`FrameSource`]. The sources here are small enough for the CLI and tests.

use ledmap_core::RgbFrame;
use palette::{FromColor, Hsv, Srgb};

/// One frame pulled from a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFrame {
    /// Image to be sampled at the mapped points
    Rgb(RgbFrame),
    /// Ready-made DMX frame, sent as is
    Dmx(Vec<u8>),
}

/// Something a playback session can pull frames from
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    /// Next frame of the current pass, `None` at the end of the pass
    fn next_frame(&mut self) -> Option<SourceFrame>;

    /// Start another pass. Returns `false` if the source cannot loop.
    fn rewind(&mut self) -> bool;

    /// Native frame rate, if the source has one
    fn fps(&self) -> Option<f32> {
        None
    }
}

/// Finite list of frames
#[derive(Debug, Clone)]
pub struct FrameSequence {
    name: String,
    frames: Vec<SourceFrame>,
    position: usize,
    fps: Option<f32>,
}

impl FrameSequence {
    pub fn new(name: impl Into<String>, frames: Vec<SourceFrame>) -> Self {
        Self {
            name: name.into(),
            frames,
            position: 0,
            fps: None,
        }
    }

    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for FrameSequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Option<SourceFrame> {
        let frame = self.frames.get(self.position)?.clone();
        self.position += 1;
        Some(frame)
    }

    fn rewind(&mut self) -> bool {
        self.position = 0;
        true
    }

    fn fps(&self) -> Option<f32> {
        self.fps
    }
}

/// Endless rainbow that scrolls across the canvas
#[derive(Debug, Clone)]
pub struct ColorSweepSource {
    frame: RgbFrame,
    period: u32,
    tick: u32,
    finite: bool,
}

impl ColorSweepSource {
    /// `period` is the number of frames for one full hue rotation
    pub fn new(width: u32, height: u32, period: u32) -> Self {
        Self {
            frame: RgbFrame::solid(width, height, [0, 0, 0]),
            period: period.max(1),
            tick: 0,
            finite: false,
        }
    }

    /// End each pass after one rotation instead of running forever
    pub fn finite(mut self) -> Self {
        self.finite = true;
        self
    }

    fn render(&mut self) {
        let width = self.frame.width();
        let phase = self.tick as f32 / self.period as f32;
        let row: Vec<[u8; 3]> = (0..width)
            .map(|x| {
                let hue = (x as f32 / width as f32 + phase).fract() * 360.0;
                let rgb: Srgb = Srgb::from_color(Hsv::new(hue, 1.0, 1.0));
                let rgb: Srgb<u8> = rgb.into_format();
                [rgb.red, rgb.green, rgb.blue]
            })
            .collect();
        for line in self.frame.data_mut().chunks_exact_mut(width as usize * 3) {
            for (pixel, rgb) in line.chunks_exact_mut(3).zip(&row) {
                pixel.copy_from_slice(rgb);
            }
        }
    }
}

impl FrameSource for ColorSweepSource {
    fn name(&self) -> &str {
        "color-sweep"
    }

    fn next_frame(&mut self) -> Option<SourceFrame> {
        if self.finite && self.tick >= self.period {
            return None;
        }
        self.render();
        self.tick = if self.finite {
            self.tick + 1
        } else {
            (self.tick + 1) % self.period
        };
        Some(SourceFrame::Rgb(self.frame.clone()))
    }

    fn rewind(&mut self) -> bool {
        self.tick = 0;
        true
    }
}
