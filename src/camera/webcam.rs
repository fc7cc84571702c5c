//! Native webcam backend built on nokhwa.
//!
//! The camera is opened inside a background thread which keeps the most
//! recent frame in a shared buffer. The sequencer samples that buffer, the
//! same way a browser samples whatever a `<video>` element currently shows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::query;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};

use super::device::{CameraDevice, VideoSource};
use super::types::{CameraError, CameraInfo, CameraSettings, Frame, FrameFormat, Resolution};

/// The system's webcams.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebcamDevice;

impl CameraDevice for WebcamDevice {
    fn devices(&self) -> Result<Vec<CameraInfo>, CameraError> {
        let devices =
            query(ApiBackend::Auto).map_err(|e| CameraError::QueryFailed(e.to_string()))?;

        Ok(devices
            .into_iter()
            .map(|d| CameraInfo {
                index: d.index().as_index().unwrap_or(0),
                name: d.human_name(),
                description: d.description().to_string(),
            })
            .collect())
    }

    fn open(&self, settings: &CameraSettings) -> Result<Box<dyn VideoSource>, CameraError> {
        let devices = self.devices()?;
        if devices.is_empty() {
            return Err(CameraError::NoDevices);
        }
        if !devices.iter().any(|d| d.index == settings.device_index) {
            return Err(CameraError::DeviceNotFound(settings.device_index));
        }

        let buffer = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let (info_tx, info_rx) = mpsc::channel::<Result<Resolution, CameraError>>();

        let thread_buffer = Arc::clone(&buffer);
        let thread_stop = Arc::clone(&stop);
        let thread_settings = settings.clone();
        let handle = thread::spawn(move || {
            run_capture_loop(thread_settings, thread_buffer, thread_stop, info_tx);
        });

        let mut source = WebcamSource {
            buffer,
            stop,
            thread: Some(handle),
            resolution: settings.resolution,
        };

        match info_rx.recv() {
            Ok(Ok(resolution)) => {
                log::info!("Webcam {} streaming at {}", settings.device_index, resolution);
                source.resolution = resolution;
                Ok(Box::new(source))
            }
            Ok(Err(e)) => {
                source.stop();
                Err(e)
            }
            Err(_) => {
                source.stop();
                Err(CameraError::StreamFailed(
                    "Capture thread terminated unexpectedly".to_string(),
                ))
            }
        }
    }
}

struct WebcamSource {
    buffer: Arc<Mutex<Option<Frame>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    resolution: Resolution,
}

impl VideoSource for WebcamSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        if !self.is_live() {
            return None;
        }
        self.buffer.lock().ok()?.clone()
    }

    fn is_live(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        if let Ok(mut buf) = self.buffer.lock() {
            *buf = None;
        }
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture_loop(
    settings: CameraSettings,
    buffer: Arc<Mutex<Option<Frame>>>,
    stop: Arc<AtomicBool>,
    info_tx: mpsc::Sender<Result<Resolution, CameraError>>,
) {
    let index = CameraIndex::Index(settings.device_index);

    let mut camera = match open_camera_with_fallback(&index, &settings) {
        Ok(cam) => cam,
        Err(e) => {
            let _ = info_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = info_tx.send(Err(CameraError::StreamFailed(e.to_string())));
        return;
    }

    let res = camera.resolution();
    let _ = info_tx.send(Ok(Resolution {
        width: res.width(),
        height: res.height(),
    }));

    while !stop.load(Ordering::Relaxed) {
        if let Ok(raw) = camera.frame()
            && let Some(frame) = convert_to_rgb(&raw)
            && let Ok(mut buf) = buffer.lock()
        {
            *buf = Some(frame);
        }
        thread::sleep(Duration::from_millis(1));
    }

    let _ = camera.stop_stream();
}

/// Try NV12, then MJPEG at the requested resolution, then whatever the camera offers.
fn open_camera_with_fallback(
    index: &CameraIndex,
    settings: &CameraSettings,
) -> Result<Camera, CameraError> {
    let requested = nokhwa::utils::Resolution::new(
        settings.resolution.width,
        settings.resolution.height,
    );
    let format_attempts = [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            requested,
            NokhwaFrameFormat::NV12,
            settings.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            requested,
            NokhwaFrameFormat::MJPEG,
            settings.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = None;
    for format in format_attempts {
        match Camera::new(index.clone(), format) {
            Ok(cam) => return Ok(cam),
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    let msg = last_error.unwrap_or_else(|| "no usable camera format".to_string());
    let lower = msg.to_lowercase();
    if lower.contains("permission")
        || lower.contains("denied")
        || lower.contains("authorization")
        || lower.contains("access")
    {
        Err(CameraError::PermissionDenied)
    } else {
        Err(CameraError::OpenFailed(msg))
    }
}

/// Decode a nokhwa buffer (MJPEG, YUYV, NV12, ...) into an RGB frame.
fn convert_to_rgb(buffer: &nokhwa::Buffer) -> Option<Frame> {
    let decoded = buffer.decode_image::<RgbFormat>().ok()?;
    let resolution = buffer.resolution();

    Some(Frame {
        data: decoded.into_raw(),
        width: resolution.width(),
        height: resolution.height(),
        format: FrameFormat::Rgb,
        timestamp: Instant::now(),
    })
}
