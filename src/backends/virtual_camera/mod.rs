// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! Replays still images as a camera preview. Each sample returns the next
//! image in order, looping at the end. Useful for testing the scan loop
//! without hardware and for scanning codes from saved pictures.

use crate::backends::camera::types::*;
use crate::backends::camera::{CameraBackend, PreviewStream};
use crate::orientation::PreviewRotation;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Device id reported by the virtual backend
pub const VIRTUAL_DEVICE_ID: &str = "virtual-0";

/// Load an image file as an RGBA camera frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::InitializationFailed(format!(
            "Failed to load image '{}': {}",
            path.display(),
            e
        ))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(width, height, "Image loaded");

    Ok(CameraFrame::packed(width, height, PixelFormat::RGBA, rgba.into_raw()))
}

/// Camera backend serving a fixed list of frames
pub struct VirtualCameraBackend {
    frames: Arc<[CameraFrame]>,
}

impl VirtualCameraBackend {
    /// Load every image in `paths`
    pub fn from_files(paths: &[PathBuf]) -> BackendResult<Self> {
        let frames = paths
            .iter()
            .map(|path| load_image_as_frame(path))
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Self::with_frames(frames))
    }

    pub fn with_frames(frames: Vec<CameraFrame>) -> Self {
        Self {
            frames: Arc::from(frames),
        }
    }
}

impl CameraBackend for VirtualCameraBackend {
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![CameraDevice::new(
            "Virtual Camera",
            VIRTUAL_DEVICE_ID,
            EnclosurePanel::Unknown,
        )])
    }

    fn open_preview(
        &mut self,
        device: &CameraDevice,
        events: PreviewEventSender,
    ) -> BackendResult<Box<dyn PreviewStream>> {
        if device.id != VIRTUAL_DEVICE_ID {
            return Err(BackendError::DeviceNotFound(device.name.clone()));
        }
        Ok(Box::new(VirtualPreview {
            frames: Arc::clone(&self.frames),
            next: AtomicUsize::new(0),
            events,
            playing: false,
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }
}

struct VirtualPreview {
    frames: Arc<[CameraFrame]>,
    next: AtomicUsize,
    events: PreviewEventSender,
    playing: bool,
}

impl PreviewStream for VirtualPreview {
    fn start(&mut self) -> BackendResult<()> {
        if self.frames.is_empty() {
            return Err(BackendError::InitializationFailed("No images loaded".into()));
        }
        self.playing = true;
        info!(frames = self.frames.len(), "Virtual preview started");
        let _ = self.events.send(PreviewEvent::Playing);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        if !self.playing || self.frames.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        let mut frame = self.frames[index].clone();
        frame.captured_at = Instant::now();
        Some(frame)
    }

    fn set_rotation(&mut self, rotation: PreviewRotation) -> BackendResult<()> {
        // Still images are already upright
        debug!(%rotation, "Ignoring rotation for virtual preview");
        Ok(())
    }

    fn stop(&mut self) {
        if self.playing {
            self.playing = false;
            info!("Virtual preview stopped");
        }
    }
}
