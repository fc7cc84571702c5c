//! Sampling the live video into a pixel buffer and encoding it as JPEG.

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::camera::Frame;
use crate::frame::CapturedFrame;

/// JPEG quality used for enrollment frames (0.8 on a 0..1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Why a single grab produced no frame. Never fatal to a capture.
#[derive(Debug, thiserror::Error)]
pub enum GrabError {
    #[error("no active camera session")]
    SessionClosed,
    #[error("no frame available on the live surface")]
    NoFrame,
    #[error("surface has zero size ({width}x{height})")]
    EmptySurface { width: u32, height: u32 },
    #[error("frame holds {actual} bytes, expected {expected}")]
    BufferMismatch { expected: usize, actual: usize },
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Off-screen drawing surface sized to whatever frame is drawn onto it.
#[derive(Debug, Clone, Copy)]
pub struct Surface {
    quality: u8,
    mirror: bool,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY, false)
    }
}

impl Surface {
    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8, mirror: bool) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            mirror,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Draw `frame` at its native resolution and encode it.
    pub fn grab(&self, frame: &Frame, sequence: u32) -> Result<CapturedFrame, GrabError> {
        let pixels = self.sample(frame)?;

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            &pixels,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;

        Ok(CapturedFrame::new(sequence, frame.width, frame.height, jpeg))
    }

    fn sample(&self, frame: &Frame) -> Result<Vec<u8>, GrabError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(GrabError::EmptySurface {
                width: frame.width,
                height: frame.height,
            });
        }
        let expected = frame.expected_len();
        if frame.data.len() != expected {
            return Err(GrabError::BufferMismatch {
                expected,
                actual: frame.data.len(),
            });
        }

        let mut pixels = frame.data.clone();
        if self.mirror {
            mirror_rows(&mut pixels, frame.width as usize, frame.bytes_per_pixel());
        }
        Ok(pixels)
    }
}

/// Flip each row left-right in place.
fn mirror_rows(data: &mut [u8], width: usize, bpp: usize) {
    for row in data.chunks_exact_mut(width * bpp) {
        for x in 0..width / 2 {
            let left = x * bpp;
            let right = (width - 1 - x) * bpp;
            for i in 0..bpp {
                row.swap(left + i, right + i);
            }
        }
    }
}
