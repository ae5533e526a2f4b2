// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The scan loop never talks to a camera API directly. It goes through two
//! traits:
//!
//! ```text
//! ┌──────────────────────┐
//! │ ScanSessionController│
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CameraSessionManager │  ← device selection, display lock, teardown
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐      ┌───────────────┐
//! │  CameraBackend trait │ ───▶ │ PreviewStream │
//! └──────────┬───────────┘      └───────────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌─────────┐ ┌─────────┐
//! │GStreamer│ │ Virtual │
//! └─────────┘ └─────────┘
//! ```

pub mod gstreamer_backend;
pub mod session;
pub mod types;

pub use session::{CameraSessionManager, CaptureSession, find_camera_device_by_panel};
pub use types::*;

use crate::orientation::PreviewRotation;
use std::path::PathBuf;

/// Platform camera-capture API
///
/// Backends enumerate devices and bind a preview stream to one of them.
pub trait CameraBackend: Send {
    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>>;

    /// Open a device and bind a preview stream to it
    ///
    /// The stream is created stopped. Once [`PreviewStream::start`] has been
    /// called it reports `Playing`, failures and end of stream on `events`.
    fn open_preview(
        &mut self,
        device: &CameraDevice,
        events: PreviewEventSender,
    ) -> BackendResult<Box<dyn PreviewStream>>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;
}

/// Live preview bound to an open camera
pub trait PreviewStream: Send {
    /// Start rendering. Completion is reported asynchronously with
    /// [`PreviewEvent::Playing`].
    fn start(&mut self) -> BackendResult<()>;

    /// Whether frames are currently flowing
    fn is_playing(&self) -> bool;

    /// The frame currently displayed, if one has been rendered
    fn current_frame(&self) -> Option<CameraFrame>;

    /// Apply a rotation correction to the stream
    fn set_rotation(&mut self, rotation: PreviewRotation) -> BackendResult<()>;

    /// Stop rendering and release the device. Must be safe to call twice.
    fn stop(&mut self);
}

/// Create a backend instance for the given type
///
/// `virtual_images` is only used by the virtual backend.
pub fn get_backend(
    backend_type: CameraBackendType,
    virtual_images: &[PathBuf],
) -> BackendResult<Box<dyn CameraBackend>> {
    match backend_type {
        CameraBackendType::Gstreamer => Ok(Box::new(gstreamer_backend::GstreamerBackend::new()?)),
        CameraBackendType::Virtual => Ok(Box::new(
            crate::backends::virtual_camera::VirtualCameraBackend::from_files(virtual_images)?,
        )),
    }
}
