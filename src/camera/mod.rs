//! Camera access for enrollment capture.
//!
//! - Backends implement [`CameraDevice`] and hand out [`VideoSource`]s
//! - [`MockCamera`] is always available and drives the tests
//! - [`WebcamDevice`] talks to real hardware when the `webcam` feature is on

mod device;
mod mock;
mod types;
#[cfg(feature = "webcam")]
mod webcam;

pub use device::{CameraDevice, VideoSource};
pub use mock::MockCamera;
pub use types::{CameraError, CameraInfo, CameraSettings, Frame, FrameFormat, Resolution};
#[cfg(feature = "webcam")]
pub use webcam::WebcamDevice;
