// SPDX-License-Identifier: GPL-3.0-only

//! Preview rotation correction
//!
//! Maps the orientation of the UI on the display to the clockwise rotation
//! that has to be applied to the preview stream so frames come out upright.
//! Front cameras are mirrored, which inverts the direction of the rotation.
//! External cameras have no fixed mounting, so no correction is applied.

use crate::backends::camera::{BackendResult, PreviewStream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Orientation of the application on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayOrientation {
    #[default]
    Landscape,
    Portrait,
    LandscapeFlipped,
    PortraitFlipped,
}

impl DisplayOrientation {
    pub const ALL: [DisplayOrientation; 4] = [
        DisplayOrientation::Landscape,
        DisplayOrientation::Portrait,
        DisplayOrientation::LandscapeFlipped,
        DisplayOrientation::PortraitFlipped,
    ];
}

/// Rotation in degrees (clockwise) applied to the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PreviewRotation {
    /// No rotation
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl PreviewRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => PreviewRotation::Rotate90,
            180 => PreviewRotation::Rotate180,
            270 => PreviewRotation::Rotate270,
            _ => PreviewRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            PreviewRotation::None => 0,
            PreviewRotation::Rotate90 => 90,
            PreviewRotation::Rotate180 => 180,
            PreviewRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, PreviewRotation::Rotate90 | PreviewRotation::Rotate270)
    }
}

impl std::fmt::Display for PreviewRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Rotation needed to display the preview upright for `orientation`
pub fn rotation_for(orientation: DisplayOrientation, mirrored: bool) -> PreviewRotation {
    let degrees = match orientation {
        DisplayOrientation::Portrait => 90,
        DisplayOrientation::LandscapeFlipped => 180,
        DisplayOrientation::PortraitFlipped => 270,
        DisplayOrientation::Landscape => 0,
    };

    // The rotation direction is inverted when the preview is mirrored
    if mirrored {
        PreviewRotation::from_degrees((360 - degrees) % 360)
    } else {
        PreviewRotation::from_degrees(degrees)
    }
}

/// Tracks the display orientation and keeps the preview rotation in sync
#[derive(Debug, Clone)]
pub struct OrientationAdapter {
    orientation: DisplayOrientation,
    external_camera: bool,
    mirroring: bool,
    applied: Option<PreviewRotation>,
}

impl OrientationAdapter {
    pub fn new(orientation: DisplayOrientation) -> Self {
        Self {
            orientation,
            external_camera: false,
            mirroring: false,
            applied: None,
        }
    }

    /// Set the mounting information of the camera that was opened
    pub fn configure(&mut self, external_camera: bool, mirroring: bool) {
        self.external_camera = external_camera;
        self.mirroring = mirroring;
        self.applied = None;
    }

    pub fn orientation(&self) -> DisplayOrientation {
        self.orientation
    }

    /// Rotation currently applied to the preview, if any
    pub fn applied(&self) -> Option<PreviewRotation> {
        self.applied
    }

    /// Rotation the preview should have for the current orientation
    pub fn current_rotation(&self) -> PreviewRotation {
        rotation_for(self.orientation, self.mirroring)
    }

    /// Record a new orientation and, if a preview is running, re-apply the
    /// rotation to it.
    ///
    /// Returns the rotation that was applied, `None` when nothing was done.
    pub fn on_orientation_changed(
        &mut self,
        orientation: DisplayOrientation,
        preview: Option<&mut dyn PreviewStream>,
    ) -> BackendResult<Option<PreviewRotation>> {
        debug!(?orientation, "Display orientation changed");
        self.orientation = orientation;

        match preview {
            Some(preview) => self.apply(preview),
            None => Ok(None),
        }
    }

    /// Apply the rotation for the current orientation to `preview`
    ///
    /// No-op for external cameras.
    pub fn apply(
        &mut self,
        preview: &mut dyn PreviewStream,
    ) -> BackendResult<Option<PreviewRotation>> {
        if self.external_camera {
            return Ok(None);
        }

        let rotation = self.current_rotation();
        preview.set_rotation(rotation)?;
        self.applied = Some(rotation);
        info!(
            orientation = ?self.orientation,
            mirroring = self.mirroring,
            %rotation,
            "Applied preview rotation"
        );
        Ok(Some(rotation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::CameraFrame;

    #[derive(Default)]
    struct RecordingPreview {
        rotations: Vec<PreviewRotation>,
    }

    impl PreviewStream for RecordingPreview {
        fn start(&mut self) -> BackendResult<()> {
            Ok(())
        }
        fn is_playing(&self) -> bool {
            true
        }
        fn current_frame(&self) -> Option<CameraFrame> {
            None
        }
        fn set_rotation(&mut self, rotation: PreviewRotation) -> BackendResult<()> {
            self.rotations.push(rotation);
            Ok(())
        }
        fn stop(&mut self) {}
    }

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(rotation_for(DisplayOrientation::Portrait, false).degrees(), 90);
        assert_eq!(rotation_for(DisplayOrientation::Landscape, false).degrees(), 0);
        assert_eq!(
            rotation_for(DisplayOrientation::LandscapeFlipped, false).degrees(),
            180
        );
        assert_eq!(
            rotation_for(DisplayOrientation::PortraitFlipped, false).degrees(),
            270
        );
    }

    #[test]
    fn test_mirrored_rotation_is_inverted() {
        for orientation in DisplayOrientation::ALL {
            let plain = rotation_for(orientation, false).degrees();
            let mirrored = rotation_for(orientation, true).degrees();
            assert!([0, 90, 180, 270].contains(&mirrored));
            assert_eq!(mirrored, (360 - plain) % 360, "{:?}", orientation);
        }
    }

    #[test]
    fn test_from_degrees_normalises() {
        assert_eq!(PreviewRotation::from_degrees(-90), PreviewRotation::Rotate270);
        assert_eq!(PreviewRotation::from_degrees(450), PreviewRotation::Rotate90);
        assert_eq!(PreviewRotation::from_degrees(45), PreviewRotation::None);
        assert!(PreviewRotation::Rotate90.swaps_dimensions());
    }

    #[test]
    fn test_external_camera_is_not_rotated() {
        let mut adapter = OrientationAdapter::new(DisplayOrientation::Portrait);
        adapter.configure(true, false);
        let mut preview = RecordingPreview::default();

        let applied = adapter.apply(&mut preview).unwrap();
        assert_eq!(applied, None);
        assert!(preview.rotations.is_empty());
    }

    #[test]
    fn test_orientation_change_reapplies_rotation() {
        let mut adapter = OrientationAdapter::new(DisplayOrientation::Landscape);
        adapter.configure(false, true);
        let mut preview = RecordingPreview::default();

        adapter.apply(&mut preview).unwrap();
        adapter
            .on_orientation_changed(DisplayOrientation::Portrait, Some(&mut preview))
            .unwrap();

        assert_eq!(
            preview.rotations,
            vec![PreviewRotation::None, PreviewRotation::Rotate270]
        );
        assert_eq!(adapter.applied(), Some(PreviewRotation::Rotate270));
    }

    #[test]
    fn test_orientation_change_without_preview_is_remembered() {
        let mut adapter = OrientationAdapter::new(DisplayOrientation::Landscape);
        let applied = adapter
            .on_orientation_changed(DisplayOrientation::PortraitFlipped, None)
            .unwrap();
        assert_eq!(applied, None);
        assert_eq!(adapter.current_rotation(), PreviewRotation::Rotate270);
    }
}
