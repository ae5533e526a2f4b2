// SPDX-License-Identifier: MPL-2.0

//! Error types for barcode scanning
//!
//! Every platform or decoder failure is converted into a [`ScanError`] at the
//! boundary where it happens and reported through the scan's `fail` path.
//! "No symbol in this frame" is not an error and never appears here.

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using ScanError
pub type AppResult<T> = Result<T, ScanError>;

/// Main scan error type
#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// No camera could be opened (not retried)
    DeviceUnavailable(DeviceError),
    /// The camera reported a failure after the preview had started
    DeviceFailed(String),
    /// A frame was sampled while the preview was not running
    NotPreviewing,
    /// The external decoder raised an error
    DecodeLibrary(String),
    /// Scan options could not be parsed
    InvalidOptions(String),
    /// Configuration errors
    Config(String),
}

/// Camera acquisition errors
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// Device enumeration returned nothing
    NoCameraFound,
    /// The selected device could not be opened or its preview started
    OpenFailed(String),
    /// The preview never reported that it was playing
    PreviewTimeout,
    /// Backend is missing on this system
    Backend(String),
}

/// Error raised by a [`BarcodeDecoder`](crate::scanner::BarcodeDecoder)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

impl DecodeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::DeviceUnavailable(e) => write!(f, "Camera unavailable: {}", e),
            ScanError::DeviceFailed(msg) => write!(f, "Camera failed: {}", msg),
            ScanError::NotPreviewing => write!(f, "Scan failed, not previewing"),
            ScanError::DecodeLibrary(msg) => write!(f, "Decoder error: {}", msg),
            ScanError::InvalidOptions(msg) => write!(f, "Invalid scan options: {}", msg),
            ScanError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NoCameraFound => write!(f, "No camera devices found"),
            DeviceError::OpenFailed(msg) => write!(f, "Failed to open camera: {}", msg),
            DeviceError::PreviewTimeout => write!(f, "Preview did not start in time"),
            DeviceError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ScanError {}
impl std::error::Error for DeviceError {}
impl std::error::Error for DecodeError {}

impl From<DeviceError> for ScanError {
    fn from(err: DeviceError) -> Self {
        ScanError::DeviceUnavailable(err)
    }
}

impl From<DecodeError> for ScanError {
    fn from(err: DecodeError) -> Self {
        ScanError::DecodeLibrary(err.0)
    }
}

impl From<BackendError> for DeviceError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceNotFound(_) => DeviceError::NoCameraFound,
            BackendError::NotAvailable(msg) => DeviceError::Backend(msg),
            other => DeviceError::OpenFailed(other.to_string()),
        }
    }
}

impl From<BackendError> for ScanError {
    fn from(err: BackendError) -> Self {
        ScanError::DeviceUnavailable(err.into())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::InvalidOptions(err.to_string())
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}
