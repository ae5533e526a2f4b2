// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for the platform services a scan needs
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Scan session                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │   Display   │    │     Camera       │    │
//! │  │  (D-Bus)    │    │   (GStreamer)    │    │
//! │  └─────────────┘    └──────────────────┘    │
//! │                     ┌──────────────────┐    │
//! │                     │ Virtual Camera   │    │
//! │                     │ (still images)   │    │
//! │                     └──────────────────┘    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera backends, device selection and session lifecycle
//! - [`display`]: Keep-display-awake lock held while a preview runs
//! - [`virtual_camera`]: Camera backend replaying still images

pub mod camera;
pub mod display;
pub mod virtual_camera;
