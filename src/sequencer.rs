//! Multi-frame capture over a live camera session.
//!
//! A [`CaptureSequencer`] owns at most one [`CameraSession`]. A capture
//! walks `1..=N`: publish progress, wait the settle delay, grab one frame.
//! Grabs that fail are dropped, then the ordered batch goes to the
//! completion callback exactly once.
//!
//! The sequencer is cheap to clone; clones share the session, the progress
//! counter and the last batch. The session is released when the last clone
//! is dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::camera::{CameraDevice, CameraError, CameraSettings, Frame};
use crate::frame::{CaptureBatch, CapturedFrame};
use crate::notify::{Notification, NotificationSink};
use crate::session::CameraSession;
use crate::surface::{DEFAULT_JPEG_QUALITY, GrabError, Surface};

/// Frames per enrollment batch.
pub const DEFAULT_CAPTURE_COUNT: u32 = 5;

/// Pause before each grab so the subject can settle.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound the CLI and config accept for a single batch.
pub const MAX_CAPTURE_COUNT: u32 = 100;

/// Per-capture parameters.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Frames requested when the caller does not say otherwise
    pub count: u32,
    /// Delay before each grab
    pub settle_delay: Duration,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            count: DEFAULT_CAPTURE_COUNT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("Unable to access camera: {0}")]
    DeviceUnavailable(#[source] CameraError),
    #[error("No active camera session. Start the camera before capturing")]
    NoActiveSession,
    #[error("A capture is already in progress")]
    CaptureInProgress,
}

struct Inner {
    device: Arc<dyn CameraDevice>,
    camera: CameraSettings,
    capture: CaptureSettings,
    surface: Surface,
    notifier: Arc<dyn NotificationSink>,
    session: Mutex<Option<CameraSession>>,
    next_session_id: AtomicU64,
    capturing: AtomicBool,
    progress: watch::Sender<u32>,
    last_batch: Mutex<Option<CaptureBatch>>,
}

#[derive(Clone)]
pub struct CaptureSequencer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CaptureSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSequencer")
            .field("camera", &self.inner.camera)
            .field("capture", &self.inner.capture)
            .field("is_active", &self.is_active())
            .field("progress", &self.progress())
            .finish_non_exhaustive()
    }
}

/// Marks a capture as running. Dropping it, whether the loop finished or the
/// future was cancelled, resets progress to idle and clears the flag.
struct CaptureGuard<'a>(&'a Inner);

impl<'a> CaptureGuard<'a> {
    fn acquire(inner: &'a Inner) -> Option<Self> {
        inner
            .capturing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(inner))
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.0.progress.send_replace(0);
        self.0.capturing.store(false, Ordering::SeqCst);
    }
}

impl CaptureSequencer {
    pub fn new(
        device: Arc<dyn CameraDevice>,
        camera: CameraSettings,
        capture: CaptureSettings,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let (progress, _) = watch::channel(0);
        let surface = Surface::new(capture.jpeg_quality, camera.mirror);
        Self {
            inner: Arc::new(Inner {
                device,
                camera,
                capture,
                surface,
                notifier,
                session: Mutex::new(None),
                next_session_id: AtomicU64::new(1),
                capturing: AtomicBool::new(false),
                progress,
                last_batch: Mutex::new(None),
            }),
        }
    }

    pub fn capture_settings(&self) -> &CaptureSettings {
        &self.inner.capture
    }

    /// Acquire the camera. A no-op while a session is already active.
    ///
    /// On failure no session exists afterwards and one error notification
    /// has been raised.
    pub fn start_session(&self) -> Result<(), SequencerError> {
        let mut slot = self.session();
        if slot.as_ref().is_some_and(CameraSession::is_active) {
            log::debug!("Camera session already active");
            return Ok(());
        }
        // A session whose tracks died on their own still holds the device.
        if let Some(stale) = slot.take() {
            stale.stop();
        }

        match self.inner.device.open(&self.inner.camera) {
            Ok(source) => {
                let id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst);
                let session = CameraSession::new(id, source);
                log::info!(
                    "Camera session {} started at {}",
                    id,
                    session.resolution()
                );
                *slot = Some(session);
                Ok(())
            }
            Err(e) => {
                log::warn!("Camera access failed: {}", e);
                self.inner.notifier.notify(Notification::error(
                    "Camera Error",
                    "Unable to access camera. Please check permissions.",
                ));
                Err(SequencerError::DeviceUnavailable(e))
            }
        }
    }

    /// Release the camera. A no-op without a session.
    pub fn stop_session(&self) {
        if let Some(session) = self.session().take() {
            session.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.session().as_ref().is_some_and(CameraSession::is_active)
    }

    /// Current live frame, for preview.
    pub fn preview_frame(&self) -> Option<Frame> {
        self.session().as_mut()?.current_frame()
    }

    /// Iteration currently being captured, or 0 when idle.
    pub fn progress(&self) -> u32 {
        *self.inner.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<u32> {
        self.inner.progress.subscribe()
    }

    /// The batch delivered by the most recent capture.
    pub fn last_batch(&self) -> Option<CaptureBatch> {
        self.inner
            .last_batch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Capture `target_count` frames and hand them to `on_complete`.
    ///
    /// Once started the loop always runs to the end; if the session is
    /// stopped midway the remaining grabs fail and are left out of the
    /// batch. Returns the number of frames delivered.
    ///
    /// Dropping the returned future abandons the batch: `on_complete` is not
    /// called and progress goes back to 0.
    pub async fn capture_batch<F>(
        &self,
        target_count: u32,
        on_complete: F,
    ) -> Result<usize, SequencerError>
    where
        F: FnOnce(CaptureBatch) + Send,
    {
        if !self.is_active() {
            return Err(SequencerError::NoActiveSession);
        }
        let guard = CaptureGuard::acquire(&self.inner).ok_or(SequencerError::CaptureInProgress)?;

        log::info!("Capturing {} frames", target_count);
        let mut results = Vec::new();
        for i in 1..=target_count {
            self.inner.progress.send_replace(i);
            tokio::time::sleep(self.inner.capture.settle_delay).await;
            results.push(self.grab(i));
        }

        let batch = CaptureBatch::from_results(target_count, results);
        drop(guard);
        *self
            .inner
            .last_batch
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(batch.clone());

        let captured = batch.len();
        on_complete(batch);

        log::info!("Captured {}/{} frames", captured, target_count);
        self.inner.notifier.notify(Notification::success(
            "Capture Complete",
            format!("Successfully captured {} images for registration.", captured),
        ));
        Ok(captured)
    }

    fn grab(&self, sequence: u32) -> Result<CapturedFrame, GrabError> {
        let frame = {
            let mut slot = self.session();
            let session = slot.as_mut().ok_or(GrabError::SessionClosed)?;
            if !session.is_active() {
                return Err(GrabError::SessionClosed);
            }
            session.current_frame().ok_or(GrabError::NoFrame)?
        };
        log::debug!("Grabbed frame {} ({}x{})", sequence, frame.width, frame.height);
        self.inner.surface.grab(&frame, sequence)
    }

    fn session(&self) -> MutexGuard<'_, Option<CameraSession>> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
