// SPDX-License-Identifier: MPL-2.0

//! Barcode scanner - camera preview, frame sampling and decode loop
//!
//! A single [`Scanner::scan`] call opens a camera, keeps its preview running
//! and samples a frame every 100 ms into the barcode decoder until a code is
//! found, something fails, or the caller cancels (back navigation, app pause
//! or suspend).
//!
//! # Architecture
//!
//! - [`backends`]: camera backends (GStreamer, virtual) and the
//!   keep-display-awake lock
//! - [`orientation`]: display orientation to preview rotation mapping
//! - [`scanner`]: frame sampler, decode adapter and the scan controller
//! - [`config`]: user configuration
//!
//! # Example
//!
//! ```ignore
//! let scanner = Scanner::from_config(&Config::load(), &[])?;
//! let handle = scanner.scan(
//!     |result| println!("{}", result.text),
//!     |error| eprintln!("{}", error),
//!     ScanOptions::default(),
//! );
//! // later, when the user navigates back:
//! handle.back();
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod orientation;
pub mod scanner;

// Re-export commonly used types
pub use backends::camera::{CameraDevice, CameraSessionManager, EnclosurePanel};
pub use config::Config;
pub use errors::{AppResult, DeviceError, ScanError};
pub use orientation::{DisplayOrientation, OrientationAdapter, PreviewRotation};
pub use scanner::{
    BarcodeDecoder, BarcodeFormat, CancelReason, ScanHandle, ScanOptions, ScanOutcome, ScanResult,
    ScanSignals, ScanState, Scanner, ZxingDecoder,
};
