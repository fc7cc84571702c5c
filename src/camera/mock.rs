//! Synthetic camera backend for tests and machines without a webcam.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::device::{CameraDevice, VideoSource};
use super::types::{CameraError, CameraInfo, CameraSettings, Frame, FrameFormat, Resolution};

#[derive(Debug, Default)]
struct MockState {
    opens: AtomicUsize,
    live: AtomicUsize,
}

/// A scripted camera producing a moving RGB test pattern.
///
/// Clones share the same device lock and counters, so a test can keep a
/// handle to inspect how many sources are live after handing one to the
/// sequencer.
#[derive(Debug, Clone, Default)]
pub struct MockCamera {
    native: Option<Resolution>,
    open_delay: Duration,
    deny_access: bool,
    failing_grabs: Arc<HashSet<u32>>,
    state: Arc<MockState>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this resolution regardless of what the session requests.
    pub fn with_native_resolution(mut self, resolution: Resolution) -> Self {
        self.native = Some(resolution);
        self
    }

    /// Block the calling thread for `delay` on every open, like a real
    /// device waiting for its stream to start.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Refuse every open as if the user denied camera permission.
    pub fn deny_access(mut self) -> Self {
        self.deny_access = true;
        self
    }

    /// Make the given grabs (1-based, counted per source) yield no frame.
    pub fn fail_grabs(mut self, grabs: impl IntoIterator<Item = u32>) -> Self {
        self.failing_grabs = Arc::new(grabs.into_iter().collect());
        self
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Number of sources currently holding the device.
    pub fn live_sources(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }
}

impl CameraDevice for MockCamera {
    fn devices(&self) -> Result<Vec<CameraInfo>, CameraError> {
        Ok(vec![CameraInfo {
            index: 0,
            name: "Mock Camera".to_string(),
            description: "Synthetic test pattern".to_string(),
        }])
    }

    fn open(&self, settings: &CameraSettings) -> Result<Box<dyn VideoSource>, CameraError> {
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }
        if self.deny_access {
            return Err(CameraError::PermissionDenied);
        }
        if settings.device_index != 0 {
            return Err(CameraError::DeviceNotFound(settings.device_index));
        }
        if self
            .state
            .live
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CameraError::Busy(settings.device_index));
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockSource {
            resolution: self.native.unwrap_or(settings.resolution),
            failing_grabs: Arc::clone(&self.failing_grabs),
            state: Arc::clone(&self.state),
            grabs: 0,
            stopped: false,
        }))
    }
}

struct MockSource {
    resolution: Resolution,
    failing_grabs: Arc<HashSet<u32>>,
    state: Arc<MockState>,
    grabs: u32,
    stopped: bool,
}

impl MockSource {
    fn pattern(&self, seed: u32) -> Frame {
        let Resolution { width, height } = self.resolution;
        let mut data = Vec::with_capacity(self.resolution.pixel_count() * 3);
        for y in 0..height {
            for x in 0..width {
                data.push(((x + seed * 16) % 256) as u8);
                data.push(((y + seed * 8) % 256) as u8);
                data.push(((seed * 40) % 256) as u8);
            }
        }
        Frame {
            data,
            width,
            height,
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        }
    }
}

impl VideoSource for MockSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        if self.stopped {
            return None;
        }
        self.grabs += 1;
        if self.failing_grabs.contains(&self.grabs) {
            return None;
        }
        Some(self.pattern(self.grabs))
    }

    fn is_live(&self) -> bool {
        !self.stopped
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.state.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.stop();
    }
}
