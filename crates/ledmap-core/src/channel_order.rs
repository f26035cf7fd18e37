//! Fixture channel ordering
//!
//! LED strips and pixel fixtures disagree on the byte order of their color
//! channels. A [`ChannelOrder`] is a fixed permutation of one RGB triple and
//! a [`ChannelOrderMap`] picks the order per universe, falling back to a
//! default for universes without an explicit entry.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Byte order expected by a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Grb,
    Bgr,
    Rbg,
    Gbr,
    Brg,
}

impl ChannelOrder {
    /// All supported orders
    pub const ALL: [ChannelOrder; 6] = [
        ChannelOrder::Rgb,
        ChannelOrder::Grb,
        ChannelOrder::Bgr,
        ChannelOrder::Rbg,
        ChannelOrder::Gbr,
        ChannelOrder::Brg,
    ];

    /// Gather table: output byte `i` is taken from input byte `indices()[i]`.
    pub const fn indices(self) -> [usize; 3] {
        match self {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Grb => [1, 0, 2],
            ChannelOrder::Bgr => [2, 1, 0],
            ChannelOrder::Rbg => [0, 2, 1],
            ChannelOrder::Gbr => [1, 2, 0],
            ChannelOrder::Brg => [2, 0, 1],
        }
    }

    /// The order that undoes this one.
    pub const fn inverse(self) -> Self {
        match self {
            ChannelOrder::Gbr => ChannelOrder::Brg,
            ChannelOrder::Brg => ChannelOrder::Gbr,
            // The remaining permutations are their own inverse
            other => other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelOrder::Rgb => "RGB",
            ChannelOrder::Grb => "GRB",
            ChannelOrder::Bgr => "BGR",
            ChannelOrder::Rbg => "RBG",
            ChannelOrder::Gbr => "GBR",
            ChannelOrder::Brg => "BRG",
        }
    }

    /// Permute every complete triple of `data` in place.
    ///
    /// Trailing bytes that do not form a full triple are left untouched.
    pub fn apply(self, data: &mut [u8]) {
        if self == ChannelOrder::Rgb {
            return;
        }
        let [a, b, c] = self.indices();
        for triple in data.chunks_exact_mut(3) {
            let src = [triple[0], triple[1], triple[2]];
            triple[0] = src[a];
            triple[1] = src[b];
            triple[2] = src[c];
        }
    }

    /// Permute the color triple of every `stride`-byte pixel group.
    ///
    /// `value_width` is the number of bytes per channel value (2 at 16-bit
    /// depth). Used for fixtures with more than three channels per point
    /// (RGBW and friends) where only the color triple is wired differently.
    /// Trailing bytes that do not form a full pixel are left untouched.
    pub fn apply_pixels(self, data: &mut [u8], stride: usize, value_width: usize) {
        if stride == 3 && value_width == 1 {
            self.apply(data);
            return;
        }
        if !(1..=2).contains(&value_width) || stride < 3 * value_width || self == ChannelOrder::Rgb
        {
            return;
        }
        let indices = self.indices();
        let mut src = [0u8; 6];
        for pixel in data.chunks_exact_mut(stride) {
            let color = &mut pixel[..3 * value_width];
            src[..color.len()].copy_from_slice(color);
            for (slot, &from) in indices.iter().enumerate() {
                let dst = slot * value_width;
                let from = from * value_width;
                color[dst..dst + value_width].copy_from_slice(&src[from..from + value_width]);
            }
        }
    }
}

impl fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelOrder {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        ChannelOrder::ALL
            .into_iter()
            .find(|order| order.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownChannelOrder(s.to_string()))
    }
}

/// Per-universe channel order configuration
///
/// Serialized as a flat map: `{"default": "RGB", "3": "GRB"}` where every key
/// other than `default` is a universe number.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "HashMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct ChannelOrderMap {
    default: ChannelOrder,
    per_universe: HashMap<u16, ChannelOrder>,
}

impl ChannelOrderMap {
    pub fn new(default: ChannelOrder) -> Self {
        Self {
            default,
            per_universe: HashMap::new(),
        }
    }

    /// Set the order for one universe number
    pub fn set(&mut self, universe: u16, order: ChannelOrder) {
        self.per_universe.insert(universe, order);
    }

    pub fn default_order(&self) -> ChannelOrder {
        self.default
    }

    /// Order used for `universe`, or the default when it has no entry
    pub fn order_for(&self, universe: u16) -> ChannelOrder {
        self.per_universe
            .get(&universe)
            .copied()
            .unwrap_or(self.default)
    }
}

impl TryFrom<HashMap<String, String>> for ChannelOrderMap {
    type Error = CoreError;

    fn try_from(raw: HashMap<String, String>) -> Result<Self> {
        let mut map = ChannelOrderMap::default();
        for (key, value) in raw {
            let order: ChannelOrder = value.parse()?;
            if key.eq_ignore_ascii_case("default") {
                map.default = order;
            } else {
                let universe: u16 = key.trim().parse().map_err(|_| {
                    CoreError::invalid_config(format!(
                        "universe_configs key '{}' is neither 'default' nor a universe number",
                        key
                    ))
                })?;
                map.per_universe.insert(universe, order);
            }
        }
        Ok(map)
    }
}

impl From<ChannelOrderMap> for BTreeMap<String, String> {
    fn from(map: ChannelOrderMap) -> Self {
        let mut out = BTreeMap::new();
        out.insert("default".to_string(), map.default.name().to_string());
        for (universe, order) in map.per_universe {
            out.insert(universe.to_string(), order.name().to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grb_swaps_red_and_green() {
        let mut data = [10u8, 20, 30];
        ChannelOrder::Grb.apply(&mut data);
        assert_eq!(data, [20, 10, 30]);

        ChannelOrder::Grb.inverse().apply(&mut data);
        assert_eq!(data, [10, 20, 30]);
    }

    #[test]
    fn test_remainder_passes_through() {
        let mut data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        ChannelOrder::Bgr.apply(&mut data);
        assert_eq!(data, [3, 2, 1, 6, 5, 4, 7, 8]);
    }

    #[test]
    fn test_strided_only_touches_color_triple() {
        // RGBW pixels
        let mut data = [1u8, 2, 3, 99, 4, 5, 6, 98];
        ChannelOrder::Grb.apply_pixels(&mut data, 4, 1);
        assert_eq!(data, [2, 1, 3, 99, 5, 4, 6, 98]);
    }

    #[test]
    fn test_sixteen_bit_values_move_as_pairs() {
        // One 16-bit RGB pixel: R=0x0102, G=0x0304, B=0x0506
        let mut data = [1u8, 2, 3, 4, 5, 6];
        ChannelOrder::Bgr.apply_pixels(&mut data, 6, 2);
        assert_eq!(data, [5, 6, 3, 4, 1, 2]);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("grb".parse::<ChannelOrder>().unwrap(), ChannelOrder::Grb);
        assert_eq!(" BRG ".parse::<ChannelOrder>().unwrap(), ChannelOrder::Brg);
        assert!("RGBX".parse::<ChannelOrder>().is_err());
    }

    #[test]
    fn test_order_map_fallback() {
        let json = r#"{"default": "GRB", "3": "BGR"}"#;
        let map: ChannelOrderMap = serde_json::from_str(json).unwrap();

        assert_eq!(map.default_order(), ChannelOrder::Grb);
        assert_eq!(map.order_for(3), ChannelOrder::Bgr);
        assert_eq!(map.order_for(0), ChannelOrder::Grb);
    }

    #[test]
    fn test_order_map_rejects_bad_keys() {
        let bad_key = r#"{"default": "RGB", "left": "GRB"}"#;
        assert!(serde_json::from_str::<ChannelOrderMap>(bad_key).is_err());

        let bad_order = r#"{"default": "XYZ"}"#;
        assert!(serde_json::from_str::<ChannelOrderMap>(bad_order).is_err());
    }

    #[test]
    fn test_order_map_serializes_flat() {
        let mut map = ChannelOrderMap::new(ChannelOrder::Rgb);
        map.set(2, ChannelOrder::Gbr);

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["default"], "RGB");
        assert_eq!(json["2"], "GBR");
    }
}
