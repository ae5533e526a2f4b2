// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer camera backend
//!
//! Works with whatever video sources GStreamer's device providers expose
//! (PipeWire, libcamera, V4L2).

mod enumeration;
mod pipeline;

pub use enumeration::{DiscoveredCamera, enumerate_cameras};
pub use pipeline::GstreamerPreview;

use super::types::*;
use super::{CameraBackend, PreviewStream};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Camera backend on top of the GStreamer device monitor
pub struct GstreamerBackend {
    /// Device handles from the last enumeration, keyed by device id
    known: Mutex<HashMap<String, gstreamer::Device>>,
}

impl GstreamerBackend {
    pub fn new() -> BackendResult<Self> {
        gstreamer::init().map_err(|e| BackendError::NotAvailable(e.to_string()))?;
        Ok(Self {
            known: Mutex::new(HashMap::new()),
        })
    }

    fn lookup(&self, id: &str) -> Option<gstreamer::Device> {
        self.known.lock().ok()?.get(id).cloned()
    }
}

impl CameraBackend for GstreamerBackend {
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        let discovered = enumerate_cameras()?;

        if let Ok(mut known) = self.known.lock() {
            known.clear();
            for camera in &discovered {
                known.insert(camera.device.id.clone(), camera.handle.clone());
            }
        }

        Ok(discovered.into_iter().map(|camera| camera.device).collect())
    }

    fn open_preview(
        &mut self,
        device: &CameraDevice,
        events: PreviewEventSender,
    ) -> BackendResult<Box<dyn PreviewStream>> {
        let handle = match self.lookup(&device.id) {
            Some(handle) => handle,
            None => {
                debug!(id = %device.id, "Device not cached, re-enumerating");
                self.enumerate_cameras()?;
                self.lookup(&device.id)
                    .ok_or_else(|| BackendError::DeviceNotFound(device.name.clone()))?
            }
        };

        Ok(Box::new(GstreamerPreview::new(&handle, device, events)?))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Gstreamer
    }
}
