//! Camera device and live video source abstractions.

use super::types::{CameraError, CameraInfo, CameraSettings, Frame, Resolution};

/// A camera that can be opened into a live video source.
///
/// Opening a device takes the exclusive device lock; the lock is held until
/// the returned source is stopped.
pub trait CameraDevice: Send + Sync {
    /// Enumerate the devices this backend can open.
    fn devices(&self) -> Result<Vec<CameraInfo>, CameraError>;

    /// Acquire the device described by `settings` and start streaming.
    fn open(&self, settings: &CameraSettings) -> Result<Box<dyn VideoSource>, CameraError>;
}

/// A live stream of frames from an acquired device.
pub trait VideoSource: Send {
    /// Native resolution of the stream.
    fn resolution(&self) -> Resolution;

    /// The most recent frame on the live surface, if one is available.
    fn latest_frame(&mut self) -> Option<Frame>;

    /// Whether the underlying tracks are still running.
    fn is_live(&self) -> bool;

    /// Stop all tracks and release the device. Must be idempotent.
    fn stop(&mut self);
}
