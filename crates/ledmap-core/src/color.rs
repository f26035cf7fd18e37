//! Color correction and fixture channel generation
//!
//! Sampled colors are kept columnar ([`RgbBatch`]) so the correction pass is
//! three independent table lookups per point. Brightness, contrast and the
//! per-channel offsets only ever depend on the input value of their own
//! channel, so [`ColorCorrector`] folds them into one 256-entry table per
//! channel at construction time.

use crate::config::{BitDepth, ColorConfig, LedConfig, LedType, WhiteConfig, WhiteMethod, WhiteMode};
use crate::points::PointMapping;

/// Luminance weights (Rec. 709)
const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];
/// Amber is derived from the red/green overlap
const AMBER_FACTOR: f32 = 0.8;
/// Amber gate relative to the white threshold
const AMBER_GATE: f32 = 0.7;
const WARMEST_KELVIN: f32 = 2700.0;
const COOLEST_KELVIN: f32 = 6500.0;

/// Columnar batch of RGB samples, one entry per point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RgbBatch {
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
}

impl RgbBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            r: Vec::with_capacity(capacity),
            g: Vec::with_capacity(capacity),
            b: Vec::with_capacity(capacity),
        }
    }

    /// Build a batch from interleaved RGB triples
    pub fn from_triples(triples: &[[u8; 3]]) -> Self {
        let mut batch = Self::with_capacity(triples.len());
        for &[r, g, b] in triples {
            batch.push(r, g, b);
        }
        batch
    }

    pub fn push(&mut self, r: u8, g: u8, b: u8) {
        self.r.push(r);
        self.g.push(g);
        self.b.push(b);
    }

    pub fn clear(&mut self) {
        self.r.clear();
        self.g.clear();
        self.b.clear();
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    pub fn get(&self, index: usize) -> [u8; 3] {
        [self.r[index], self.g[index], self.b[index]]
    }
}

/// Brightness/contrast/offset correction plus white-channel extraction
#[derive(Debug, Clone)]
pub struct ColorCorrector {
    luts: [[u8; 256]; 3],
    identity: bool,
    white: WhiteConfig,
    led_type: LedType,
    bit_depth: BitDepth,
}

impl ColorCorrector {
    pub fn new(color: ColorConfig, white: WhiteConfig, led_type: LedType, bit_depth: BitDepth) -> Self {
        let offsets = [color.red, color.green, color.blue];
        let luts = offsets.map(|offset| build_lut(color.contrast, color.brightness, offset));
        Self {
            luts,
            identity: color.is_identity(),
            white,
            led_type,
            bit_depth,
        }
    }

    pub fn from_config(config: &LedConfig) -> Self {
        Self::new(config.color, config.white, config.led_type, config.bit_depth)
    }

    /// Wire bytes written per point
    pub fn channels_per_point(&self) -> usize {
        self.led_type.channels_per_point() * self.bit_depth.bytes_per_value()
    }

    pub fn led_type(&self) -> LedType {
        self.led_type
    }

    /// Correct a single value of channel `channel` (0 = R, 1 = G, 2 = B)
    pub fn correct_value(&self, channel: usize, value: u8) -> u8 {
        self.luts[channel][value as usize]
    }

    /// Apply brightness, contrast and per-channel offsets in place
    pub fn apply(&self, batch: &mut RgbBatch) {
        if self.identity {
            return;
        }
        let [lut_r, lut_g, lut_b] = &self.luts;
        for v in batch.r.iter_mut() {
            *v = lut_r[*v as usize];
        }
        for v in batch.g.iter_mut() {
            *v = lut_g[*v as usize];
        }
        for v in batch.b.iter_mut() {
            *v = lut_b[*v as usize];
        }
    }

    /// Fixture channel values for one corrected RGB triple, as 0-255 floats.
    ///
    /// Returns the values and how many of them are used for the LED type.
    pub fn fixture_values(&self, rgb: [u8; 3]) -> ([f32; 6], usize) {
        let [r, g, b] = rgb.map(f32::from);
        let count = self.led_type.channels_per_point();
        if self.led_type == LedType::Rgb {
            return ([r, g, b, 0.0, 0.0, 0.0], count);
        }

        let white = if self.white.enabled {
            self.white_intensity(r, g, b)
        } else {
            0.0
        };
        let removed = match self.white.mode {
            WhiteMode::Replace => white,
            WhiteMode::Hybrid => white * 0.5,
            WhiteMode::Additive => 0.0,
        };
        let (r, g, b) = (
            (r - removed).max(0.0),
            (g - removed).max(0.0),
            (b - removed).max(0.0),
        );

        let cool_share = self.cool_fraction();
        let cool = white * cool_share;
        let warm = white * (1.0 - cool_share);

        let values = match self.led_type {
            LedType::Rgb => [r, g, b, 0.0, 0.0, 0.0],
            LedType::Rgbw => [r, g, b, white, 0.0, 0.0],
            LedType::Rgbaw => {
                let mut amber = r.min(g) * AMBER_FACTOR;
                if !self.white.enabled || amber < f32::from(self.white.threshold) * AMBER_GATE {
                    amber = 0.0;
                }
                [r, g, b, amber, white, 0.0]
            }
            LedType::Rgbww => [r, g, b, warm, cool, 0.0],
            LedType::Rgbcw => [r, g, b, cool, warm, 0.0],
            LedType::Rgbcww => [r, g, b, cool, warm, white],
        };
        (values, count)
    }

    /// Write the fixture channels of one point into `out`
    ///
    /// `out` must hold [`channels_per_point`](Self::channels_per_point) bytes.
    pub fn write_point(&self, rgb: [u8; 3], out: &mut [u8]) {
        let (values, count) = self.fixture_values(rgb);
        match self.bit_depth {
            BitDepth::Eight => {
                for (dst, v) in out.iter_mut().zip(&values[..count]) {
                    *dst = to_u8(*v);
                }
            }
            BitDepth::Sixteen => {
                for (dst, v) in out.chunks_exact_mut(2).zip(&values[..count]) {
                    dst.copy_from_slice(&to_u16(*v).to_be_bytes());
                }
            }
        }
    }

    /// Write every point of `batch` at its mapped frame offset.
    ///
    /// Points whose channels would run past the end of `frame` are skipped.
    pub fn write_channels(&self, batch: &RgbBatch, mappings: &[PointMapping], frame: &mut [u8]) {
        let width = self.channels_per_point();
        for (index, mapping) in mappings.iter().enumerate().take(batch.len()) {
            let start = mapping.frame_offset;
            if let Some(out) = frame.get_mut(start..start + width) {
                self.write_point(batch.get(index), out);
            }
        }
    }

    fn white_intensity(&self, r: f32, g: f32, b: f32) -> f32 {
        let white = match self.white.method {
            WhiteMethod::Minimum => r.min(g).min(b),
            WhiteMethod::Average => (r + g + b) / 3.0,
            WhiteMethod::Luminance => {
                r * LUMA_WEIGHTS[0] + g * LUMA_WEIGHTS[1] + b * LUMA_WEIGHTS[2]
            }
        };
        if white < f32::from(self.white.threshold) {
            0.0
        } else {
            white
        }
    }

    /// 0.0 at 2700 K (all warm) up to 1.0 at 6500 K (all cool)
    fn cool_fraction(&self) -> f32 {
        let kelvin = f32::from(self.white.color_temperature);
        ((kelvin - WARMEST_KELVIN) / (COOLEST_KELVIN - WARMEST_KELVIN)).clamp(0.0, 1.0)
    }
}

fn build_lut(contrast: i16, brightness: i16, offset: i16) -> [u8; 256] {
    let multiplier = 1.0 + f32::from(contrast) / 255.0;
    let shift = f32::from(brightness) + f32::from(offset);
    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let contrasted = (value as f32 - 128.0) * multiplier + 128.0;
        *slot = to_u8(contrasted + shift);
    }
    lut
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn to_u16(value: f32) -> u16 {
    (value.clamp(0.0, 255.0) * 257.0).round() as u16
}
