// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Timing constants for the scan loop and camera pipeline
pub mod timing {
    use super::Duration;

    /// Delay between two sampling ticks
    pub const SAMPLE_INTERVAL_MS: u64 = 100;

    /// How long to wait for the preview to report that it is playing
    pub const PREVIEW_START_TIMEOUT_SECS: u64 = 10;

    /// Timeout for pipeline state changes when starting
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Timeout for pipeline state changes when stopping
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Log frame statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 120;

    /// Default sampling interval as a Duration
    pub const fn sample_interval() -> Duration {
        Duration::from_millis(SAMPLE_INTERVAL_MS)
    }
}

/// Frame sampling constants
pub mod sampling {
    /// Frames are downscaled so the longest edge is at most this many pixels
    /// before decoding. Barcodes in a viewfinder stay readable at 640px.
    pub const MAX_SAMPLE_DIMENSION: u32 = 640;
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Name of the preview pipeline
    pub const PIPELINE_NAME: &str = "barcode-preview";

    /// Name of the rotation element inside the preview pipeline
    pub const FLIP_ELEMENT: &str = "flip";

    /// Name of the appsink element inside the preview pipeline
    pub const SINK_ELEMENT: &str = "sink";

    /// Maximum buffers queued in the appsink (older frames are dropped)
    pub const MAX_BUFFERS: u32 = 2;

    /// Device class used to discover cameras
    pub const VIDEO_SOURCE_CLASS: &str = "Video/Source";
}

/// Application identity
pub mod app {
    /// Application name (config directory, D-Bus inhibit requests)
    pub const APP_NAME: &str = "barcode-scanner";

    /// Reason sent with the screensaver inhibit request
    pub const INHIBIT_REASON: &str = "Scanning a barcode";

    /// Config file name inside the config directory
    pub const CONFIG_FILE: &str = "config.json";
}
