// SPDX-License-Identifier: GPL-3.0-only

//! Camera session lifecycle
//!
//! The manager owns the backend and the display-awake lock, and holds at
//! most one open [`CaptureSession`]. Opening selects a device by enclosure
//! panel, binds and starts its preview and takes the display lock. Closing
//! undoes all of that and is safe to call any number of times.

use super::types::*;
use super::{CameraBackend, PreviewStream};
use crate::backends::display::DisplayRequest;
use crate::errors::{DeviceError, ScanError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// An open camera device and its preview
pub struct CaptureSession {
    id: Uuid,
    device: CameraDevice,
    mirroring_preview: bool,
    external_camera: bool,
    active: bool,
    preview: Box<dyn PreviewStream>,
}

impl CaptureSession {
    /// Unique id of this session (for logs)
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// True only for front-panel cameras
    pub fn is_mirroring(&self) -> bool {
        self.mirroring_preview
    }

    /// True when the device reports no enclosure panel
    pub fn is_external(&self) -> bool {
        self.external_camera
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn preview(&self) -> &dyn PreviewStream {
        self.preview.as_ref()
    }

    pub fn preview_mut(&mut self) -> &mut dyn PreviewStream {
        self.preview.as_mut()
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("mirroring_preview", &self.mirroring_preview)
            .field("external_camera", &self.external_camera)
            .field("active", &self.active)
            .finish()
    }
}

/// Find the device mounted on `panel`, or the first device if none is
pub fn find_camera_device_by_panel(
    devices: &[CameraDevice],
    panel: EnclosurePanel,
) -> Option<&CameraDevice> {
    devices
        .iter()
        .find(|device| device.panel == panel)
        .or_else(|| devices.first())
}

/// Camera session manager
///
/// Owns the camera backend and the display request. Exclusively owns the
/// open session, so sessions can never overlap.
pub struct CameraSessionManager {
    backend: Box<dyn CameraBackend>,
    display: Box<dyn DisplayRequest>,
    session: Option<CaptureSession>,
}

impl CameraSessionManager {
    pub fn new(backend: Box<dyn CameraBackend>, display: Box<dyn DisplayRequest>) -> Self {
        info!(backend = %backend.backend_type(), "Creating camera session manager");
        Self {
            backend,
            display,
            session: None,
        }
    }

    pub fn backend_type(&self) -> CameraBackendType {
        self.backend.backend_type()
    }

    /// Enumerate available cameras
    pub fn enumerate_cameras(&self) -> Result<Vec<CameraDevice>, ScanError> {
        let cameras = self.backend.enumerate_cameras()?;
        if cameras.is_empty() {
            Err(DeviceError::NoCameraFound.into())
        } else {
            Ok(cameras)
        }
    }

    /// Open a camera, preferring the one on `panel`, and start its preview
    ///
    /// Any session still open is closed first. Preview events are delivered
    /// on `events`; `Playing` arrives once the first frame is rendered.
    pub fn open(
        &mut self,
        panel: EnclosurePanel,
        events: PreviewEventSender,
    ) -> Result<&mut CaptureSession, ScanError> {
        if self.session.is_some() {
            warn!("Camera session already open, closing it first");
            self.close();
        }

        let cameras = self.enumerate_cameras().inspect_err(|e| {
            info!(error = %e, "No camera device available");
        })?;

        let device = find_camera_device_by_panel(&cameras, panel)
            .cloned()
            .ok_or(ScanError::DeviceUnavailable(DeviceError::NoCameraFound))?;

        // No location information means the camera is not part of the device
        let external_camera = device.panel == EnclosurePanel::Unknown;
        // Only mirror the preview if the camera is on the front panel
        let mirroring_preview = !external_camera && device.panel == EnclosurePanel::Front;

        let id = Uuid::new_v4();
        info!(
            session = %id,
            device = %device.name,
            device_id = %device.id,
            panel = %device.panel,
            external_camera,
            mirroring_preview,
            "Opening camera session"
        );

        let mut preview = self
            .backend
            .open_preview(&device, events)
            .map_err(|e| DeviceError::OpenFailed(e.to_string()))?;

        if let Err(e) = preview.start() {
            preview.stop();
            return Err(DeviceError::OpenFailed(e.to_string()).into());
        }

        // Prevent the display from sleeping while the preview is running
        if let Err(e) = self.display.request_active() {
            warn!(error = %e, "Could not keep the display awake");
        }

        Ok(self.session.insert(CaptureSession {
            id,
            device,
            mirroring_preview,
            external_camera,
            active: true,
            preview,
        }))
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut CaptureSession> {
        self.session.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Stop the preview, release the display lock and drop the session
    ///
    /// Returns `false` when there was nothing to close.
    pub fn close(&mut self) -> bool {
        let Some(mut session) = self.session.take() else {
            debug!("Camera session already closed");
            return false;
        };

        info!(session = %session.id, device = %session.device.name, "Closing camera session");
        session.active = false;
        session.preview.stop();

        // Allow the screen to sleep now that the preview is stopped
        self.display.request_release();
        true
    }
}

impl Drop for CameraSessionManager {
    fn drop(&mut self) {
        if self.session.is_some() {
            debug!("CameraSessionManager dropped with open session, closing it");
            self.close();
        }
    }
}
