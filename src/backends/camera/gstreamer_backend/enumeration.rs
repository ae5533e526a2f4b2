// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer camera enumeration
//!
//! Cameras are discovered with a `DeviceMonitor` filtered on video sources.
//! PipeWire (libcamera) devices carry their enclosure location in the
//! `api.libcamera.location` property; plain V4L2 devices have none and are
//! reported as external cameras.

use crate::backends::camera::types::{BackendError, BackendResult, CameraDevice, EnclosurePanel};
use crate::constants::pipeline;
use gstreamer::prelude::*;
use tracing::{debug, info};

/// Properties that may hold the camera location, in priority order
const LOCATION_KEYS: &[&str] = &["api.libcamera.location", "camera.location", "device.location"];

/// Properties that may hold a stable device identifier, in priority order
const ID_KEYS: &[&str] = &["object.serial", "api.v4l2.path", "device.path", "object.path"];

/// A camera found by the device monitor
#[derive(Debug, Clone)]
pub struct DiscoveredCamera {
    pub device: CameraDevice,
    pub handle: gstreamer::Device,
}

/// Enumerate video sources known to GStreamer
pub fn enumerate_cameras() -> BackendResult<Vec<DiscoveredCamera>> {
    debug!("Enumerating cameras via GStreamer device monitor");

    gstreamer::init().map_err(|e| BackendError::NotAvailable(e.to_string()))?;

    let monitor = gstreamer::DeviceMonitor::new();
    let _filter = monitor.add_filter(Some(pipeline::VIDEO_SOURCE_CLASS), None);
    monitor.start().map_err(|e| {
        BackendError::NotAvailable(format!("Device monitor failed to start: {}", e))
    })?;
    let devices = monitor.devices();
    monitor.stop();

    let mut cameras: Vec<DiscoveredCamera> = Vec::new();
    for (index, handle) in devices.into_iter().enumerate() {
        let name = handle.display_name().to_string();
        let properties = handle.properties();

        let panel = properties
            .as_ref()
            .and_then(|props| first_string_property(props, LOCATION_KEYS))
            .map(|location| EnclosurePanel::from_location(&location))
            .unwrap_or(EnclosurePanel::Unknown);

        let id = properties
            .as_ref()
            .and_then(|props| first_string_property(props, ID_KEYS))
            .unwrap_or_else(|| format!("{}-{}", index, name));

        // The same camera can be exposed by more than one provider
        if cameras.iter().any(|c| c.device.id == id) {
            debug!(id = %id, name = %name, "Skipping duplicate camera");
            continue;
        }

        debug!(id = %id, name = %name, panel = %panel, "Found video camera");
        cameras.push(DiscoveredCamera {
            device: CameraDevice::new(name, id, panel),
            handle,
        });
    }

    info!(count = cameras.len(), "Camera enumeration complete");
    Ok(cameras)
}

/// First property in `keys` that is present as a string (or integer)
fn first_string_property(props: &gstreamer::StructureRef, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        props
            .get::<String>(*key)
            .ok()
            .or_else(|| props.get::<i32>(*key).ok().map(|v| v.to_string()))
            .or_else(|| props.get::<u64>(*key).ok().map(|v| v.to_string()))
            .filter(|value| !value.is_empty())
    })
}
