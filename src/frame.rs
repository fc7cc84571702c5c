//! Encoded still frames and the ordered batches they are delivered in.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::surface::GrabError;

/// MIME type of every captured frame.
pub const FRAME_MIME: &str = "image/jpeg";

/// One JPEG-encoded still sampled from the live video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    sequence: u32,
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

impl CapturedFrame {
    pub(crate) fn new(sequence: u32, width: u32, height: u32, jpeg: Vec<u8>) -> Self {
        Self {
            sequence,
            width,
            height,
            jpeg,
        }
    }

    /// 1-based iteration of the capture loop that produced this frame.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encoded JPEG bytes.
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Self-contained `data:image/jpeg;base64,...` payload.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", FRAME_MIME, BASE64.encode(&self.jpeg))
    }
}

/// The ordered frames produced by one capture invocation.
///
/// Frames whose grab failed are absent, so `len()` may be less than
/// `requested()`. Order is acquisition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureBatch {
    requested: u32,
    frames: Vec<CapturedFrame>,
}

impl CaptureBatch {
    /// Build a batch from per-iteration grab results, dropping the failures.
    pub(crate) fn from_results(
        requested: u32,
        results: impl IntoIterator<Item = Result<CapturedFrame, GrabError>>,
    ) -> Self {
        let frames = results
            .into_iter()
            .filter_map(|result| match result {
                Ok(frame) => Some(frame),
                Err(e) => {
                    log::debug!("Frame dropped from batch: {}", e);
                    None
                }
            })
            .collect();
        Self { requested, frames }
    }

    /// Number of frames the caller asked for.
    pub fn requested(&self) -> u32 {
        self.requested
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True when no grab was dropped.
    pub fn is_complete(&self) -> bool {
        self.frames.len() == self.requested as usize
    }

    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CapturedFrame> {
        self.frames.iter()
    }

    /// Data URLs in batch order, as the registration endpoint expects them.
    pub fn data_urls(&self) -> Vec<String> {
        self.frames.iter().map(CapturedFrame::to_data_url).collect()
    }

    /// Write each frame to `dir/frame_<sequence>.jpg`, creating `dir` if needed.
    pub fn write_jpegs(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        self.frames
            .iter()
            .map(|frame| {
                let path = dir.join(format!("frame_{}.jpg", frame.sequence));
                fs::write(&path, &frame.jpeg)?;
                Ok(path)
            })
            .collect()
    }
}

impl IntoIterator for CaptureBatch {
    type Item = CapturedFrame;
    type IntoIter = std::vec::IntoIter<CapturedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a CaptureBatch {
    type Item = &'a CapturedFrame;
    type IntoIter = std::slice::Iter<'a, CapturedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u32) -> CapturedFrame {
        CapturedFrame::new(sequence, 2, 2, vec![0xFF, 0xD8, sequence as u8])
    }

    #[test]
    fn test_data_url_prefix() {
        let url = frame(1).to_data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let encoded = url.trim_start_matches("data:image/jpeg;base64,");
        assert_eq!(BASE64.decode(encoded).unwrap(), vec![0xFF, 0xD8, 1]);
    }

    #[test]
    fn test_failures_are_dropped_in_order() {
        let results = vec![
            Ok(frame(1)),
            Err(GrabError::NoFrame),
            Ok(frame(3)),
            Err(GrabError::SessionClosed),
            Ok(frame(5)),
        ];
        let batch = CaptureBatch::from_results(5, results);

        assert_eq!(batch.requested(), 5);
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_complete());
        let sequences: Vec<u32> = batch.iter().map(CapturedFrame::sequence).collect();
        assert_eq!(sequences, vec![1, 3, 5]);
    }

    #[test]
    fn test_empty_batch() {
        let batch = CaptureBatch::from_results(0, Vec::new());
        assert!(batch.is_empty());
        assert!(batch.is_complete());
        assert!(batch.data_urls().is_empty());
    }

    #[test]
    fn test_write_jpegs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("batch");
        let batch = CaptureBatch::from_results(2, vec![Ok(frame(1)), Ok(frame(2))]);

        let paths = batch.write_jpegs(&out).unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1], out.join("frame_2.jpg"));
        assert_eq!(fs::read(&paths[0]).unwrap(), vec![0xFF, 0xD8, 1]);
    }
}
