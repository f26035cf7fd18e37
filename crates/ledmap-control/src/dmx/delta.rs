//! Full/delta frame classification
//!
//! Art-Net has no partial-universe update, so every universe is still sent
//! in full. The classification drives bookkeeping and statistics, and delta
//! results carry the changed bytes so a transport that can use them (and
//! the tests) can rebuild frames from a baseline.

use ledmap_core::{BitDepth, DeltaEncodingConfig};

/// Fraction of changed pixels above which a full frame is cheaper
pub const FULL_FRAME_RATIO: f32 = 0.8;

/// Frame classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Full,
    Delta,
}

/// Bytes that differ from the previous frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// `(byte offset, new value)` pairs in ascending offset order
    pub changes: Vec<(usize, u8)>,
    /// Pixels whose change exceeded the threshold
    pub changed_pixels: usize,
}

/// Result of encoding one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedFrame {
    Full,
    Delta(Delta),
}

impl EncodedFrame {
    pub fn kind(&self) -> FrameKind {
        match self {
            EncodedFrame::Full => FrameKind::Full,
            EncodedFrame::Delta(_) => FrameKind::Delta,
        }
    }
}

/// Apply a delta on top of `base`. Offsets past the end are ignored.
pub fn apply_delta(base: &mut [u8], delta: &Delta) {
    for &(offset, value) in &delta.changes {
        if let Some(byte) = base.get_mut(offset) {
            *byte = value;
        }
    }
}

/// Classifies outgoing frames as full or delta
#[derive(Debug, Clone)]
pub struct DeltaEncoder {
    enabled: bool,
    threshold: u16,
    full_frame_interval: u64,
    pixel_stride: usize,
    value_width: usize,
    /// Frame offset of every point; `None` means points are packed
    point_offsets: Option<Vec<usize>>,
    frame_counter: u64,
    last_sent_frame: Option<Vec<u8>>,
}

impl DeltaEncoder {
    /// `pixel_stride` is the number of bytes per point on the wire
    pub fn new(config: &DeltaEncodingConfig, bit_depth: BitDepth, pixel_stride: usize) -> Self {
        Self {
            enabled: config.enabled,
            threshold: config.threshold_for(bit_depth),
            full_frame_interval: u64::from(config.full_frame_interval.max(1)),
            pixel_stride: pixel_stride.max(1),
            value_width: bit_depth.bytes_per_value(),
            point_offsets: None,
            frame_counter: 0,
            last_sent_frame: None,
        }
    }

    /// Count pixels at these frame offsets instead of packed strides, so
    /// gap bytes never shift the pixel grouping
    pub fn with_point_offsets(mut self, offsets: Vec<usize>) -> Self {
        self.point_offsets = Some(offsets);
        self
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn last_sent_frame(&self) -> Option<&[u8]> {
        self.last_sent_frame.as_deref()
    }

    /// Classify `frame` and make it the new baseline
    pub fn encode(&mut self, frame: &[u8]) -> EncodedFrame {
        self.frame_counter += 1;
        let encoded = self.classify(frame);
        self.remember(frame);
        encoded
    }

    /// Forget the baseline; the next frame will be full
    pub fn reset(&mut self) {
        self.last_sent_frame = None;
    }

    fn classify(&self, frame: &[u8]) -> EncodedFrame {
        if !self.enabled || self.frame_counter % self.full_frame_interval == 0 {
            return EncodedFrame::Full;
        }
        let last = match &self.last_sent_frame {
            Some(last) if last.len() == frame.len() && !frame.is_empty() => last,
            _ => return EncodedFrame::Full,
        };

        let changes: Vec<(usize, u8)> = frame
            .iter()
            .zip(last.iter())
            .enumerate()
            .filter(|(_, (new, old))| new != old)
            .map(|(offset, (&new, _))| (offset, new))
            .collect();

        let stride = self.pixel_stride;
        let (pixels, changed_pixels) = match &self.point_offsets {
            Some(offsets) => self.count_changed(offsets.iter().filter_map(|&offset| {
                let range = offset..offset + stride;
                Some((frame.get(range.clone())?, last.get(range)?))
            })),
            None => self.count_changed(frame.chunks(stride).zip(last.chunks(stride))),
        };
        if pixels == 0 {
            return EncodedFrame::Full;
        }

        let delta = Delta {
            changes,
            changed_pixels,
        };
        if changed_pixels as f32 / pixels as f32 > FULL_FRAME_RATIO {
            EncodedFrame::Full
        } else {
            EncodedFrame::Delta(delta)
        }
    }

    /// `(pixels, pixels changed above the threshold)`
    fn count_changed<'a>(&self, pixels: impl Iterator<Item = (&'a [u8], &'a [u8])>) -> (usize, usize) {
        pixels.fold((0, 0), |(total, changed), (new, old)| {
            let above = self.max_difference(new, old) > u32::from(self.threshold);
            (total + 1, changed + usize::from(above))
        })
    }

    fn max_difference(&self, new: &[u8], old: &[u8]) -> u32 {
        new.chunks(self.value_width)
            .zip(old.chunks(self.value_width))
            .map(|(n, o)| value(n).abs_diff(value(o)))
            .max()
            .unwrap_or(0)
    }

    fn remember(&mut self, frame: &[u8]) {
        match &mut self.last_sent_frame {
            Some(last) => {
                last.clear();
                last.extend_from_slice(frame);
            }
            None => self.last_sent_frame = Some(frame.to_vec()),
        }
    }
}

/// Big-endian channel value of one or two bytes
fn value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(threshold: u16, interval: u32) -> DeltaEncoder {
        let config = DeltaEncodingConfig {
            enabled: true,
            threshold,
            threshold_16bit: 2048,
            full_frame_interval: interval,
        };
        DeltaEncoder::new(&config, BitDepth::Eight, 3)
    }

    #[test]
    fn test_first_frame_is_full() {
        let mut enc = encoder(8, 30);
        assert_eq!(enc.encode(&[0; 300]).kind(), FrameKind::Full);
        assert_eq!(enc.frame_counter(), 1);
        assert_eq!(enc.last_sent_frame(), Some(&[0u8; 300][..]));
    }

    #[test]
    fn test_single_pixel_change_is_delta() {
        let mut enc = encoder(8, 30);
        let mut frame = vec![100u8; 300];
        enc.encode(&frame);

        frame[0] += 9;
        match enc.encode(&frame) {
            EncodedFrame::Delta(delta) => {
                assert_eq!(delta.changed_pixels, 1);
                assert_eq!(delta.changes, vec![(0, 109)]);
            }
            EncodedFrame::Full => panic!("expected delta"),
        }
    }

    #[test]
    fn test_change_at_threshold_is_not_counted() {
        let mut enc = encoder(8, 30);
        enc.encode(&[0; 6]);
        match enc.encode(&[8, 0, 0, 0, 0, 0]) {
            EncodedFrame::Delta(delta) => {
                assert_eq!(delta.changed_pixels, 0);
                assert_eq!(delta.changes.len(), 1);
            }
            EncodedFrame::Full => panic!("expected delta"),
        }
    }

    #[test]
    fn test_dense_change_is_full() {
        let mut enc = encoder(8, 30);
        enc.encode(&[0; 30]);
        // 9 of 10 pixels change
        let mut frame = [50u8; 30];
        frame[27..].fill(0);
        assert_eq!(enc.encode(&frame).kind(), FrameKind::Full);

        // exactly 80% is still a delta
        let mut enc = encoder(8, 30);
        enc.encode(&[0; 30]);
        let mut frame = [50u8; 30];
        frame[24..].fill(0);
        assert_eq!(enc.encode(&frame).kind(), FrameKind::Delta);
    }

    #[test]
    fn test_length_mismatch_and_disabled_are_full() {
        let mut enc = encoder(8, 30);
        enc.encode(&[0; 6]);
        assert_eq!(enc.encode(&[0; 9]).kind(), FrameKind::Full);

        let config = DeltaEncodingConfig {
            enabled: false,
            ..Default::default()
        };
        let mut enc = DeltaEncoder::new(&config, BitDepth::Eight, 3);
        enc.encode(&[0; 6]);
        assert_eq!(enc.encode(&[0; 6]).kind(), FrameKind::Full);
    }

    #[test]
    fn test_sixteen_bit_threshold() {
        let config = DeltaEncodingConfig::default();
        let mut enc = DeltaEncoder::new(&config, BitDepth::Sixteen, 6);
        assert_eq!(enc.threshold(), 2048);
        enc.encode(&[0; 60]);

        // 0x0800 = 2048: not above threshold
        let mut frame = [0u8; 60];
        frame[0] = 0x08;
        match enc.encode(&frame) {
            EncodedFrame::Delta(delta) => assert_eq!(delta.changed_pixels, 0),
            EncodedFrame::Full => panic!("expected delta"),
        }

        frame[1] = 0x01;
        match enc.encode(&frame) {
            // Only the low byte moved since the last frame
            EncodedFrame::Delta(delta) => assert_eq!(delta.changes, vec![(1, 1)]),
            EncodedFrame::Full => panic!("expected delta"),
        }
    }

    #[test]
    fn test_reset_forces_full() {
        let mut enc = encoder(8, 30);
        enc.encode(&[0; 6]);
        enc.reset();
        assert_eq!(enc.encode(&[0; 6]).kind(), FrameKind::Full);
        assert_eq!(enc.frame_counter(), 2);
    }

    #[test]
    fn test_pixels_follow_point_offsets() {
        // Two 3-byte points per 8-byte universe, 2 gap bytes after each pair
        let mut enc = encoder(8, 30).with_point_offsets(vec![0, 3, 8, 11]);
        enc.encode(&[0; 16]);

        let mut frame = [0u8; 16];
        frame[8..11].copy_from_slice(&[200, 200, 200]);
        frame[14] = 9;
        match enc.encode(&frame) {
            EncodedFrame::Delta(delta) => {
                // Packed strides would split the point at 8 across two pixels
                assert_eq!(delta.changed_pixels, 1);
                // Gap bytes are still carried for reconstruction
                assert_eq!(delta.changes, vec![(8, 200), (9, 200), (10, 200), (14, 9)]);
            }
            EncodedFrame::Full => panic!("expected delta"),
        }

        // 3 of 4 points above threshold stays a delta; all 4 is full
        let mut dense = [0u8; 16];
        for offset in [0, 3, 8] {
            dense[offset] = 100;
        }
        assert_eq!(enc.encode(&[0; 16]).kind(), FrameKind::Delta);
        assert_eq!(enc.encode(&dense).kind(), FrameKind::Delta);
        enc.encode(&[0; 16]);
        dense[11] = 100;
        assert_eq!(enc.encode(&dense).kind(), FrameKind::Full);
    }

    #[test]
    fn test_apply_delta() {
        let mut base = vec![0u8; 4];
        apply_delta(
            &mut base,
            &Delta {
                changes: vec![(1, 5), (3, 7), (10, 1)],
                changed_pixels: 1,
            },
        );
        assert_eq!(base, vec![0, 5, 0, 7]);
    }
}
