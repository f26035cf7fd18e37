//! DMX recordings
//!
//! A recording is a list of ready-made DMX frames plus the rate they were
//! captured at. Replaying one bypasses sampling and color correction.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::source::{FrameSource, SourceFrame};
use crate::{MediaError, Result};

/// Captured DMX frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmxRecording {
    pub fps: f32,
    pub frame_len: usize,
    pub frames: Vec<Vec<u8>>,
}

impl DmxRecording {
    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(MediaError::InvalidRecording(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        if let Some((index, frame)) = self
            .frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.len() != self.frame_len)
        {
            return Err(MediaError::InvalidRecording(format!(
                "frame {} has {} bytes, expected {}",
                index,
                frame.len(),
                self.frame_len
            )));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let recording: DmxRecording = serde_json::from_str(&json)?;
        recording.validate()?;
        info!(
            "Loaded recording {:?}: {} frames at {} fps",
            path,
            recording.frames.len(),
            recording.fps
        );
        Ok(recording)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        info!("Saved recording with {} frames to {:?}", self.frames.len(), path);
        Ok(())
    }

    /// Playback length in seconds
    pub fn duration_secs(&self) -> f32 {
        self.frames.len() as f32 / self.fps
    }
}

/// Collects DMX frames into a [`DmxRecording`]
#[derive(Debug, Clone)]
pub struct DmxRecorder {
    fps: f32,
    frame_len: Option<usize>,
    frames: Vec<Vec<u8>>,
    max_frames: Option<usize>,
}

impl DmxRecorder {
    pub fn new(fps: f32) -> Self {
        Self {
            fps,
            frame_len: None,
            frames: Vec::new(),
            max_frames: None,
        }
    }

    /// Stop accepting frames after `max_frames`
    pub fn with_limit(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Append a frame. The first frame fixes the frame length.
    ///
    /// Returns `Ok(false)` once the limit is reached.
    pub fn record(&mut self, frame: &[u8]) -> Result<bool> {
        if self.max_frames.is_some_and(|max| self.frames.len() >= max) {
            return Ok(false);
        }
        let frame_len = *self.frame_len.get_or_insert(frame.len());
        if frame.len() != frame_len {
            return Err(MediaError::InvalidRecording(format!(
                "frame has {} bytes, recording uses {}",
                frame.len(),
                frame_len
            )));
        }
        self.frames.push(frame.to_vec());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn finish(self) -> Result<DmxRecording> {
        let recording = DmxRecording {
            fps: self.fps,
            frame_len: self.frame_len.unwrap_or(0),
            frames: self.frames,
        };
        recording.validate()?;
        Ok(recording)
    }
}

/// Plays a recording back as DMX frames
#[derive(Debug, Clone)]
pub struct ReplaySource {
    name: String,
    recording: Arc<DmxRecording>,
    position: usize,
}

impl ReplaySource {
    pub fn new(name: impl Into<String>, recording: Arc<DmxRecording>) -> Self {
        Self {
            name: name.into(),
            recording,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl FrameSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Option<SourceFrame> {
        let frame = self.recording.frames.get(self.position)?;
        self.position += 1;
        Some(SourceFrame::Dmx(frame.clone()))
    }

    fn rewind(&mut self) -> bool {
        self.position = 0;
        true
    }

    fn fps(&self) -> Option<f32> {
        Some(self.recording.fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_recorder_fixes_frame_length() {
        let mut recorder = DmxRecorder::new(30.0).with_limit(2);
        assert!(recorder.record(&[1, 2, 3]).unwrap());
        assert!(matches!(
            recorder.record(&[1, 2]),
            Err(MediaError::InvalidRecording(_))
        ));
        assert!(recorder.record(&[4, 5, 6]).unwrap());
        assert!(!recorder.record(&[7, 8, 9]).unwrap());

        let recording = recorder.finish().unwrap();
        assert_eq!(recording.frame_len, 3);
        assert_eq!(recording.frames, vec![vec![1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn test_save_and_load() {
        let recording = DmxRecording {
            fps: 40.0,
            frame_len: 2,
            frames: vec![vec![0, 1], vec![2, 3]],
        };
        let file = NamedTempFile::new().unwrap();
        recording.save(file.path()).unwrap();
        assert_eq!(DmxRecording::load(file.path()).unwrap(), recording);
        assert_eq!(recording.duration_secs(), 0.05);
    }

    #[test]
    fn test_load_rejects_ragged_frames() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{"fps": 30.0, "frame_len": 2, "frames": [[1, 2], [3]]}"#,
        )
        .unwrap();
        assert!(matches!(
            DmxRecording::load(file.path()),
            Err(MediaError::InvalidRecording(_))
        ));
    }

    #[test]
    fn test_replay_source() {
        let recording = Arc::new(DmxRecording {
            fps: 25.0,
            frame_len: 1,
            frames: vec![vec![1], vec![2]],
        });
        let mut source = ReplaySource::new("show", recording);
        assert_eq!(source.fps(), Some(25.0));
        assert_eq!(source.next_frame(), Some(SourceFrame::Dmx(vec![1])));
        assert_eq!(source.next_frame(), Some(SourceFrame::Dmx(vec![2])));
        assert_eq!(source.next_frame(), None);
        assert!(source.rewind());
        assert_eq!(source.position(), 0);
    }
}
