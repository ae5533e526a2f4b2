// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// GStreamer device monitor (PipeWire, libcamera or V4L2 sources)
    #[default]
    Gstreamer,
    /// Still images replayed as a camera
    Virtual,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::Gstreamer => write!(f, "GStreamer"),
            CameraBackendType::Virtual => write!(f, "virtual"),
        }
    }
}

/// Physical mounting location of a camera
///
/// Reported by device enumeration. Integrated cameras report `Front` or
/// `Back`; anything without location information is `Unknown` and treated
/// as an external camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnclosurePanel {
    Front,
    #[default]
    Back,
    Unknown,
}

impl EnclosurePanel {
    /// Parse a location property ("front", "back", "external", ...)
    pub fn from_location(location: &str) -> Self {
        match location.trim().to_ascii_lowercase().as_str() {
            "front" | "user" => EnclosurePanel::Front,
            "back" | "rear" | "environment" => EnclosurePanel::Back,
            _ => EnclosurePanel::Unknown,
        }
    }
}

impl std::fmt::Display for EnclosurePanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnclosurePanel::Front => write!(f, "front"),
            EnclosurePanel::Back => write!(f, "back"),
            EnclosurePanel::Unknown => write!(f, "unknown"),
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    /// Backend-specific identifier (PipeWire serial, V4L2 path, file name)
    pub id: String,
    /// Enclosure panel, `Unknown` when the device reports none
    pub panel: EnclosurePanel,
}

impl CameraDevice {
    pub fn new(name: impl Into<String>, id: impl Into<String>, panel: EnclosurePanel) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            panel,
        }
    }
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// BGRA - 32-bit with alpha (B G R A byte order)
    BGRA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::RGBA | Self::BGRA => 4,
            Self::RGB24 => 3,
            Self::Gray8 => 1,
        }
    }
}

/// A single frame from the camera preview
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a frame from tightly packed pixel data
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel() as u32,
            data: Arc::from(data),
            format,
            captured_at: Instant::now(),
        }
    }
}

/// Asynchronous notifications from a running preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewEvent {
    /// First frame has been rendered; the preview is live
    Playing,
    /// The device or pipeline failed
    Failed(String),
    /// The stream ended without an error
    Stopped,
}

/// Sender half used by backends to report preview events
pub type PreviewEventSender = mpsc::UnboundedSender<PreviewEvent>;

/// Receiver half consumed by the scan session
pub type PreviewEventReceiver = mpsc::UnboundedReceiver<PreviewEvent>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// The preview is not running
    NotStarted,
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::NotStarted => write!(f, "Preview not started"),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
