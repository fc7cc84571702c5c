//! Camera types and data structures.

use std::fmt;
use std::time::Instant;

/// Information about an available camera device.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Device index for selection
    pub index: u32,
    /// Human-readable device name
    pub name: String,
    /// Device description
    pub description: String,
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.description)
    }
}

/// Camera resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Enrollment target resolution (640x480).
    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::VGA
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format of a live frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// RGB format (3 bytes per pixel)
    Rgb,
}

/// A live frame as delivered by the video source, before encoding.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data in RGB format
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub format: FrameFormat,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl Frame {
    /// Get the number of bytes per pixel (3 for RGB).
    pub fn bytes_per_pixel(&self) -> usize {
        match self.format {
            FrameFormat::Rgb => 3,
        }
    }

    /// Expected length of `data` for this frame's dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel()
    }
}

/// Settings used when acquiring a camera session.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Camera device index
    pub device_index: u32,
    /// Requested resolution (the device may pick the closest it supports)
    pub resolution: Resolution,
    /// Target FPS (actual may vary)
    pub fps: u32,
    /// Mirror horizontally when sampling (selfie mode)
    pub mirror: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            resolution: Resolution::default(),
            fps: 30,
            mirror: false,
        }
    }
}

/// Errors that can occur while acquiring a camera.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// No cameras found on the system
    #[error("No cameras found")]
    NoDevices,
    /// Failed to query camera devices
    #[error("Failed to query cameras: {0}")]
    QueryFailed(String),
    /// Failed to open camera
    #[error("Failed to open camera: {0}")]
    OpenFailed(String),
    /// Camera permission denied by the OS or the user
    #[error("Camera permission denied. Grant camera access to this application and retry")]
    PermissionDenied,
    /// Camera device not found at specified index
    #[error("Camera device {0} not found. Run 'list-cameras' to see available devices")]
    DeviceNotFound(u32),
    /// Device is held by another session
    #[error("Camera device {0} is busy")]
    Busy(u32),
    /// Failed to start video stream
    #[error("Failed to start camera stream: {0}")]
    StreamFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_info_display() {
        let info = CameraInfo {
            index: 0,
            name: "Test Camera".to_string(),
            description: "Built-in".to_string(),
        };
        assert_eq!(format!("{}", info), "[0] Test Camera (Built-in)");
    }

    #[test]
    fn test_resolution_default_is_vga() {
        let res = Resolution::default();
        assert_eq!(res, Resolution { width: 640, height: 480 });
        assert_eq!(res.pixel_count(), 640 * 480);
        assert_eq!(res.to_string(), "640x480");
    }

    #[test]
    fn test_camera_settings_default() {
        let settings = CameraSettings::default();
        assert_eq!(settings.device_index, 0);
        assert_eq!(settings.resolution, Resolution::VGA);
        assert_eq!(settings.fps, 30);
        assert!(!settings.mirror);
    }

    #[test]
    fn test_camera_error_display() {
        assert_eq!(format!("{}", CameraError::NoDevices), "No cameras found");
        assert_eq!(
            format!("{}", CameraError::OpenFailed("test".to_string())),
            "Failed to open camera: test"
        );
        assert!(format!("{}", CameraError::PermissionDenied).contains("permission denied"));
        assert!(format!("{}", CameraError::DeviceNotFound(5)).contains("5"));
        assert_eq!(format!("{}", CameraError::Busy(1)), "Camera device 1 is busy");
    }

    #[test]
    fn test_frame_expected_len() {
        let frame = Frame {
            data: vec![0; 6],
            width: 2,
            height: 1,
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        };
        assert_eq!(frame.bytes_per_pixel(), 3);
        assert_eq!(frame.expected_len(), frame.data.len());
    }
}
