//! enroll-capture library crate.
//!
//! Captures a short burst of webcam stills for face enrollment and delivers
//! them to the enrollment backend.

pub mod camera;
pub mod cli;
pub mod config;
pub mod enroll;
pub mod frame;
pub mod notify;
pub mod sequencer;
pub mod session;
pub mod surface;

pub use frame::{CaptureBatch, CapturedFrame};
pub use sequencer::{CaptureSequencer, CaptureSettings, SequencerError};
pub use session::CameraSession;
