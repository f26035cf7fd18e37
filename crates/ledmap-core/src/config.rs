//! Typed runtime configuration
//!
//! The configuration is loaded once from JSON or TOML (picked by file
//! extension), validated as a whole, and then handed by value to the
//! output and playback layers. Unknown keys and out-of-range values are
//! rejected here so the hot path never sees a half-valid setting.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use crate::channel_order::ChannelOrderMap;
use crate::error::{CoreError, Result};
use crate::logging::LogConfig;

/// Standard Art-Net UDP port
pub const ARTNET_PORT: u16 = 6454;
/// Largest channel count used per universe by default (170 RGB pixels)
pub const MAX_DEFAULT_CHANNELS_PER_UNIVERSE: u16 = 510;
/// Hard DMX512 limit
pub const DMX_UNIVERSE_SIZE: u16 = 512;
/// Accepted output frame rate range
pub const FPS_RANGE: std::ops::RangeInclusive<u32> = 1..=60;

/// Output resolution of every DMX channel value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BitDepth {
    #[default]
    Eight,
    Sixteen,
}

impl BitDepth {
    /// Bytes used on the wire for one channel value
    pub fn bytes_per_value(self) -> usize {
        match self {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
        }
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = CoreError;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            other => Err(CoreError::invalid_config(format!(
                "bit_depth must be 8 or 16, got {}",
                other
            ))),
        }
    }
}

impl From<BitDepth> for u8 {
    fn from(depth: BitDepth) -> Self {
        match depth {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }
}

/// Physical LED type driven by each point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LedType {
    #[default]
    Rgb,
    Rgbw,
    /// RGB + amber + white
    Rgbaw,
    /// RGB + warm white + cool white
    Rgbww,
    /// RGB + cool white + warm white
    Rgbcw,
    /// RGB + cool white + warm white + neutral white
    Rgbcww,
}

impl LedType {
    /// DMX channels occupied by one point
    pub fn channels_per_point(self) -> usize {
        match self {
            LedType::Rgb => 3,
            LedType::Rgbw => 4,
            LedType::Rgbaw | LedType::Rgbww | LedType::Rgbcw => 5,
            LedType::Rgbcww => 6,
        }
    }

    /// Whether the fixture has any white-class channel
    pub fn has_white(self) -> bool {
        self != LedType::Rgb
    }
}

/// How the white intensity is derived from an RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteMethod {
    #[default]
    #[serde(alias = "min")]
    Minimum,
    Average,
    Luminance,
}

/// How the extracted white is combined with the RGB channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteMode {
    /// Subtract the full white amount from RGB
    #[default]
    Replace,
    /// Subtract half of the white amount from RGB
    Hybrid,
    /// Leave RGB untouched
    Additive,
}

/// Brightness, contrast and per-channel offsets, all in `[-255, 255]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    pub brightness: i16,
    pub contrast: i16,
    pub red: i16,
    pub green: i16,
    pub blue: i16,
}

impl ColorConfig {
    pub fn is_identity(&self) -> bool {
        *self == ColorConfig::default()
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
        ] {
            if !(-255..=255).contains(&value) {
                return Err(CoreError::invalid_config(format!(
                    "color.{} must be within [-255, 255], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// White channel extraction for RGBW-class fixtures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WhiteConfig {
    pub enabled: bool,
    pub method: WhiteMethod,
    pub mode: WhiteMode,
    /// White intensities below this value are dropped
    pub threshold: u8,
    /// Color temperature in Kelvin used to split warm/cool white (2700-6500)
    pub color_temperature: u16,
}

impl Default for WhiteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: WhiteMethod::Minimum,
            mode: WhiteMode::Replace,
            threshold: 10,
            color_temperature: 4600,
        }
    }
}

/// Delta classification settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeltaEncodingConfig {
    pub enabled: bool,
    /// Per-pixel change threshold at 8-bit depth
    pub threshold: u16,
    /// Per-pixel change threshold at 16-bit depth
    pub threshold_16bit: u16,
    /// Every n-th frame is forced to be a full frame
    pub full_frame_interval: u32,
}

impl Default for DeltaEncodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 8,
            threshold_16bit: 2048,
            full_frame_interval: 30,
        }
    }
}

impl DeltaEncodingConfig {
    /// Threshold matching the configured bit depth
    pub fn threshold_for(&self, depth: BitDepth) -> u16 {
        match depth {
            BitDepth::Eight => self.threshold,
            BitDepth::Sixteen => self.threshold_16bit,
        }
    }
}

/// Playback session defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Speed multiplier applied to the pacing interval
    pub speed: f32,
    /// Number of passes over the source, 0 for unbounded
    pub max_loops: u32,
    /// Upper bound when joining a stopping session thread
    pub join_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            max_loops: 0,
            join_timeout_ms: 3000,
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedConfig {
    /// Unicast or broadcast destination for every universe
    pub target_ip: String,
    pub port: u16,
    /// Art-Net universe number of the first universe
    pub start_universe: u16,
    pub points_per_universe: Option<u16>,
    /// Explicit channel count per universe, overriding the derived default
    pub channels_per_universe: Option<u16>,
    pub fps: u32,
    pub bit_depth: BitDepth,
    pub led_type: LedType,
    pub delta_encoding: DeltaEncodingConfig,
    pub universe_configs: ChannelOrderMap,
    pub color: ColorConfig,
    pub white: WhiteConfig,
    pub playback: PlaybackConfig,
    pub logging: LogConfig,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            target_ip: "255.255.255.255".to_string(),
            port: ARTNET_PORT,
            start_universe: 0,
            points_per_universe: None,
            channels_per_universe: None,
            fps: 30,
            bit_depth: BitDepth::Eight,
            led_type: LedType::Rgb,
            delta_encoding: DeltaEncodingConfig::default(),
            universe_configs: ChannelOrderMap::default(),
            color: ColorConfig::default(),
            white: WhiteConfig::default(),
            playback: PlaybackConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl LedConfig {
    /// Load and validate a configuration file (`.json` or `.toml`)
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: LedConfig = match extension(path).as_str() {
            "json" => serde_json::from_str(&contents)?,
            "toml" => toml::from_str(&contents)?,
            other => return Err(CoreError::UnsupportedFormat(other.to_string())),
        };
        config.validate()?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if extension(path) != "json" {
            return Err(CoreError::UnsupportedFormat(extension(path)));
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the output path cannot honor
    pub fn validate(&self) -> Result<()> {
        self.target_ip.parse::<IpAddr>().map_err(|e| {
            CoreError::invalid_config(format!("target_ip '{}': {}", self.target_ip, e))
        })?;
        if !FPS_RANGE.contains(&self.fps) {
            return Err(CoreError::invalid_config(format!(
                "fps must be within 1..=60, got {}",
                self.fps
            )));
        }
        if self.start_universe > 0x7FFF {
            return Err(CoreError::invalid_config(format!(
                "start_universe {} exceeds the 15-bit Art-Net port address",
                self.start_universe
            )));
        }
        if let Some(points) = self.points_per_universe {
            if points == 0 {
                return Err(CoreError::invalid_config("points_per_universe must be > 0"));
            }
        }
        if let Some(channels) = self.channels_per_universe {
            if channels == 0 || channels > DMX_UNIVERSE_SIZE {
                return Err(CoreError::invalid_config(format!(
                    "channels_per_universe must be within 1..=512, got {}",
                    channels
                )));
            }
        }
        if self.channels_per_universe() < self.channels_per_point() {
            return Err(CoreError::invalid_config(
                "a universe must hold at least one point",
            ));
        }
        if self.delta_encoding.full_frame_interval == 0 {
            return Err(CoreError::invalid_config(
                "delta_encoding.full_frame_interval must be > 0",
            ));
        }
        if !(self.playback.speed.is_finite() && self.playback.speed > 0.0) {
            return Err(CoreError::invalid_config("playback.speed must be positive"));
        }
        if !(2700..=6500).contains(&self.white.color_temperature) {
            return Err(CoreError::invalid_config(format!(
                "white.color_temperature must be within 2700..=6500 K, got {}",
                self.white.color_temperature
            )));
        }
        self.color.validate()?;
        Ok(())
    }

    /// Wire channels used by one point (doubles at 16-bit depth)
    pub fn channels_per_point(&self) -> usize {
        self.led_type.channels_per_point() * self.bit_depth.bytes_per_value()
    }

    /// Channels actually filled in each universe
    ///
    /// Defaults to as many whole points as fit, capped at 510 channels.
    pub fn channels_per_universe(&self) -> usize {
        if let Some(channels) = self.channels_per_universe {
            return channels as usize;
        }
        let per_point = self.channels_per_point();
        let cap = MAX_DEFAULT_CHANNELS_PER_UNIVERSE as usize;
        let points = self
            .points_per_universe
            .map(|p| p as usize)
            .unwrap_or(cap / per_point);
        (points * per_point).min(cap)
    }

    pub fn delta_threshold(&self) -> u16 {
        self.delta_encoding.threshold_for(self.bit_depth)
    }

    /// Destination socket address for Art-Net output
    pub fn target_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.target_ip.parse().map_err(|e| {
            CoreError::invalid_config(format!("target_ip '{}': {}", self.target_ip, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_channels_per_universe() {
        let config = LedConfig::default();
        assert_eq!(config.channels_per_universe(), 510);

        let rgbw = LedConfig {
            led_type: LedType::Rgbw,
            ..Default::default()
        };
        // 127 whole RGBW points
        assert_eq!(rgbw.channels_per_universe(), 508);

        let small = LedConfig {
            points_per_universe: Some(100),
            ..Default::default()
        };
        assert_eq!(small.channels_per_universe(), 300);

        let capped = LedConfig {
            points_per_universe: Some(200),
            ..Default::default()
        };
        assert_eq!(capped.channels_per_universe(), 510);
    }

    #[test]
    fn test_delta_threshold_follows_bit_depth() {
        let mut config = LedConfig::default();
        assert_eq!(config.delta_threshold(), 8);
        config.bit_depth = BitDepth::Sixteen;
        assert_eq!(config.delta_threshold(), 2048);
    }

    #[test]
    fn test_validate_rejects_bad_fps() {
        let config = LedConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LedConfig {
            fps: 61,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_color() {
        let config = LedConfig {
            color: ColorConfig {
                contrast: 300,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_bit_depth_parsing() {
        let depth: BitDepth = serde_json::from_str("16").unwrap();
        assert_eq!(depth, BitDepth::Sixteen);
        assert!(serde_json::from_str::<BitDepth>("12").is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let json = r#"{"target_ip": "10.0.0.5", "colour": {}}"#;
        assert!(serde_json::from_str::<LedConfig>(json).is_err());
    }

    #[test]
    fn test_target_addr() {
        let config = LedConfig {
            target_ip: "192.168.1.50".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.target_addr().unwrap(),
            "192.168.1.50:6454".parse().unwrap()
        );
    }
}
