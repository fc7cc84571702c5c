//! An acquired, exclusive handle to a live camera.

use std::time::Instant;

use crate::camera::{Frame, Resolution, VideoSource};

/// Owns the device tracks for as long as it lives.
///
/// Dropping the session stops the tracks, so the device is released on every
/// exit path of the owner.
pub struct CameraSession {
    id: u64,
    source: Box<dyn VideoSource>,
    started_at: Instant,
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("id", &self.id)
            .field("resolution", &self.source.resolution())
            .field("is_active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl CameraSession {
    pub(crate) fn new(id: u64, source: Box<dyn VideoSource>) -> Self {
        Self {
            id,
            source,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn resolution(&self) -> Resolution {
        self.source.resolution()
    }

    pub fn is_active(&self) -> bool {
        self.source.is_live()
    }

    /// Current frame on the live surface.
    pub fn current_frame(&mut self) -> Option<Frame> {
        self.source.latest_frame()
    }

    /// Stop the tracks and release the device.
    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.source.is_live() {
            log::info!(
                "Releasing camera session {} after {:?}",
                self.id,
                self.started_at.elapsed()
            );
        }
        self.source.stop();
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}
