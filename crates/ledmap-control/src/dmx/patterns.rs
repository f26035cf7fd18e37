//! Static diagnostic patterns held on the wire by the transmitter

use palette::{FromColor, Hsv, Srgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ControlError;

/// Test patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestPattern {
    Red,
    Green,
    Blue,
    White,
    Yellow,
    Cyan,
    Magenta,
    /// Hue sweep across all points
    Gradient,
}

impl TestPattern {
    pub const ALL: [TestPattern; 8] = [
        TestPattern::Red,
        TestPattern::Green,
        TestPattern::Blue,
        TestPattern::White,
        TestPattern::Yellow,
        TestPattern::Cyan,
        TestPattern::Magenta,
        TestPattern::Gradient,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TestPattern::Red => "red",
            TestPattern::Green => "green",
            TestPattern::Blue => "blue",
            TestPattern::White => "white",
            TestPattern::Yellow => "yellow",
            TestPattern::Cyan => "cyan",
            TestPattern::Magenta => "magenta",
            TestPattern::Gradient => "gradient",
        }
    }

    /// Color of point `index` out of `count`
    pub fn color_at(self, index: usize, count: usize) -> [u8; 3] {
        match self {
            TestPattern::Red => [255, 0, 0],
            TestPattern::Green => [0, 255, 0],
            TestPattern::Blue => [0, 0, 255],
            TestPattern::White => [255, 255, 255],
            TestPattern::Yellow => [255, 255, 0],
            TestPattern::Cyan => [0, 255, 255],
            TestPattern::Magenta => [255, 0, 255],
            TestPattern::Gradient => {
                let hue = index as f32 / count.max(1) as f32 * 360.0;
                let rgb: Srgb = Srgb::from_color(Hsv::new(hue, 1.0, 1.0));
                let rgb: Srgb<u8> = rgb.into_format();
                [rgb.red, rgb.green, rgb.blue]
            }
        }
    }

    /// Write the pattern into a DMX frame.
    ///
    /// Only the color triple of each point is set; other bytes are zeroed.
    /// `value_width` is 2 at 16-bit depth.
    pub fn fill(self, frame: &mut [u8], point_offsets: &[usize], value_width: usize) {
        frame.fill(0);
        let count = point_offsets.len();
        for (index, &offset) in point_offsets.iter().enumerate() {
            let Some(out) = frame.get_mut(offset..offset + 3 * value_width) else {
                continue;
            };
            for (dst, value) in out
                .chunks_exact_mut(value_width)
                .zip(self.color_at(index, count))
            {
                if value_width == 2 {
                    dst.copy_from_slice(&(u16::from(value) * 257).to_be_bytes());
                } else {
                    dst[0] = value;
                }
            }
        }
    }
}

impl fmt::Display for TestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestPattern {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        TestPattern::ALL
            .into_iter()
            .find(|p| p.name() == lower)
            .ok_or_else(|| ControlError::UnknownPattern(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("red".parse::<TestPattern>().unwrap(), TestPattern::Red);
        assert_eq!(" Gradient ".parse::<TestPattern>().unwrap(), TestPattern::Gradient);
        assert!(matches!(
            "purple".parse::<TestPattern>(),
            Err(ControlError::UnknownPattern(_))
        ));
        for pattern in TestPattern::ALL {
            assert_eq!(pattern.to_string().parse::<TestPattern>().unwrap(), pattern);
        }
    }

    #[test]
    fn test_fill_solid_color_skips_extra_channels() {
        // Two RGBW points
        let mut frame = vec![9u8; 8];
        TestPattern::Yellow.fill(&mut frame, &[0, 4], 1);
        assert_eq!(frame, vec![255, 255, 0, 0, 255, 255, 0, 0]);
    }

    #[test]
    fn test_fill_sixteen_bit() {
        let mut frame = vec![0u8; 6];
        TestPattern::Blue.fill(&mut frame, &[0], 2);
        assert_eq!(frame, vec![0, 0, 0, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn test_gradient_starts_red_and_varies() {
        assert_eq!(TestPattern::Gradient.color_at(0, 3), [255, 0, 0]);
        let second = TestPattern::Gradient.color_at(1, 3);
        let third = TestPattern::Gradient.color_at(2, 3);
        assert_ne!(second, third);
        // 120 degrees is pure green
        assert_eq!(second, [0, 255, 0]);
    }

    #[test]
    fn test_fill_ignores_offsets_past_end() {
        let mut frame = vec![0u8; 3];
        TestPattern::White.fill(&mut frame, &[0, 3], 1);
        assert_eq!(frame, vec![255, 255, 255]);
    }
}
