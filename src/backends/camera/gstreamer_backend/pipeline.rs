// SPDX-License-Identifier: MPL-2.0

//! GStreamer preview pipeline
//!
//! ```text
//! <device source> ! decodebin ! videoconvert ! videoflip ! videoconvert ! RGBA appsink
//! ```
//!
//! The appsink keeps only the newest frame, which is what the frame sampler
//! reads. Rotation is applied natively by `videoflip`, so sampled frames are
//! already upright.

use crate::backends::camera::PreviewStream;
use crate::backends::camera::types::*;
use crate::constants::{pipeline, timing};
use crate::orientation::PreviewRotation;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::{VideoFormat, VideoInfo};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Preview pipeline bound to one camera device
pub struct GstreamerPreview {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    flip: gstreamer::Element,
    latest: Arc<Mutex<Option<CameraFrame>>>,
    playing: Arc<AtomicBool>,
    stopped: bool,
}

impl GstreamerPreview {
    /// Build the preview pipeline for `device`
    ///
    /// The pipeline is left in the NULL state until [`PreviewStream::start`].
    pub fn new(
        device: &gstreamer::Device,
        camera: &CameraDevice,
        events: PreviewEventSender,
    ) -> BackendResult<Self> {
        info!(device = %camera.name, id = %camera.id, "Creating preview pipeline");

        let pipeline = gstreamer::Pipeline::with_name(pipeline::PIPELINE_NAME);

        let source = device.create_element(Some("source")).map_err(|e| {
            BackendError::InitializationFailed(format!(
                "Failed to create source for {}: {}",
                camera.name, e
            ))
        })?;

        let description = format!(
            "decodebin ! videoconvert ! videoflip name={} ! videoconvert ! video/x-raw,format=RGBA ! appsink name={}",
            pipeline::FLIP_ELEMENT,
            pipeline::SINK_ELEMENT
        );
        debug!(pipeline = %description, "Parsing preview bin");
        let bin = gstreamer::parse::bin_from_description(&description, true).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to parse preview bin: {}", e))
        })?;

        pipeline
            .add_many([&source, bin.upcast_ref::<gstreamer::Element>()])
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;
        source
            .link(&bin)
            .map_err(|e| BackendError::InitializationFailed(format!("Failed to link source: {}", e)))?;

        let flip = bin.by_name(pipeline::FLIP_ELEMENT).ok_or_else(|| {
            BackendError::InitializationFailed("Failed to get videoflip".to_string())
        })?;

        let appsink = bin
            .by_name(pipeline::SINK_ELEMENT)
            .ok_or_else(|| BackendError::InitializationFailed("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| {
                BackendError::InitializationFailed("Failed to cast appsink".to_string())
            })?;

        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let latest: Arc<Mutex<Option<CameraFrame>>> = Arc::new(Mutex::new(None));
        let playing = Arc::new(AtomicBool::new(false));

        install_frame_callback(&appsink, Arc::clone(&latest), Arc::clone(&playing), events.clone());
        install_bus_handler(&pipeline, Arc::clone(&playing), events)?;

        Ok(Self {
            pipeline,
            appsink,
            flip,
            latest,
            playing,
            stopped: false,
        })
    }
}

/// Store every new sample as the latest frame; the first one marks the
/// preview as playing.
fn install_frame_callback(
    appsink: &AppSink,
    latest: Arc<Mutex<Option<CameraFrame>>>,
    playing: Arc<AtomicBool>,
    events: PreviewEventSender,
) {
    let frame_counter = AtomicU64::new(0);

    appsink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |appsink| {
                let frame_num = frame_counter.fetch_add(1, Ordering::Relaxed);

                let sample = appsink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
                let video_info = VideoInfo::from_caps(caps).map_err(|e| {
                    error!(frame = frame_num, error = ?e, "Failed to get video info");
                    gstreamer::FlowError::Error
                })?;
                let map = buffer.map_readable().map_err(|e| {
                    error!(frame = frame_num, error = ?e, "Failed to map buffer");
                    gstreamer::FlowError::Error
                })?;

                let frame = CameraFrame {
                    width: video_info.width(),
                    height: video_info.height(),
                    data: Arc::from(map.as_slice()),
                    format: pixel_format(video_info.format()),
                    stride: video_info.stride()[0] as u32,
                    captured_at: Instant::now(),
                };

                if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        frame = frame_num,
                        width = frame.width,
                        height = frame.height,
                        stride = frame.stride,
                        "Preview frame"
                    );
                }

                if let Ok(mut slot) = latest.lock() {
                    *slot = Some(frame);
                }

                if !playing.swap(true, Ordering::SeqCst) {
                    info!("Preview is playing");
                    let _ = events.send(PreviewEvent::Playing);
                }

                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );
}

/// Forward pipeline errors and end of stream as preview events
fn install_bus_handler(
    pipeline: &gstreamer::Pipeline,
    playing: Arc<AtomicBool>,
    events: PreviewEventSender,
) -> BackendResult<()> {
    let bus = pipeline
        .bus()
        .ok_or_else(|| BackendError::InitializationFailed("Pipeline has no bus".to_string()))?;

    bus.set_sync_handler(move |_bus, msg| {
        match msg.view() {
            gstreamer::MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    source = ?err.src().map(|s| s.name()),
                    "Camera pipeline error"
                );
                playing.store(false, Ordering::SeqCst);
                let _ = events.send(PreviewEvent::Failed(err.error().to_string()));
            }
            gstreamer::MessageView::Eos(_) => {
                warn!("Camera pipeline reached end of stream");
                playing.store(false, Ordering::SeqCst);
                let _ = events.send(PreviewEvent::Stopped);
            }
            _ => {}
        }
        gstreamer::BusSyncReply::Drop
    });

    Ok(())
}

fn pixel_format(format: VideoFormat) -> PixelFormat {
    match format {
        VideoFormat::Bgra | VideoFormat::Bgrx => PixelFormat::BGRA,
        VideoFormat::Rgb => PixelFormat::RGB24,
        VideoFormat::Gray8 => PixelFormat::Gray8,
        // The caps filter asks for RGBA
        _ => PixelFormat::RGBA,
    }
}

/// `videoflip` direction for a clockwise rotation
fn video_direction(rotation: PreviewRotation) -> &'static str {
    match rotation {
        PreviewRotation::None => "identity",
        PreviewRotation::Rotate90 => "90r",
        PreviewRotation::Rotate180 => "180",
        PreviewRotation::Rotate270 => "90l",
    }
}

impl PreviewStream for GstreamerPreview {
    fn start(&mut self) -> BackendResult<()> {
        if self.stopped {
            return Err(BackendError::Other("Preview pipeline already stopped".into()));
        }

        debug!("Setting preview pipeline to PLAYING state");
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to start pipeline: {}", e))
            })?;

        let (result, state, pending) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        debug!(?result, ?state, ?pending, "Preview pipeline state");
        if result.is_err() {
            let _ = self.pipeline.set_state(gstreamer::State::Null);
            return Err(BackendError::InitializationFailed(format!(
                "Pipeline failed to start (state: {:?})",
                state
            )));
        }

        Ok(())
    }

    fn is_playing(&self) -> bool {
        !self.stopped && self.playing.load(Ordering::SeqCst)
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        self.latest.lock().ok()?.clone()
    }

    fn set_rotation(&mut self, rotation: PreviewRotation) -> BackendResult<()> {
        if self.stopped {
            return Err(BackendError::NotStarted);
        }
        self.flip
            .set_property_from_str("video-direction", video_direction(rotation));
        debug!(%rotation, "Preview rotation set");
        Ok(())
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        info!("Stopping preview pipeline");

        // Clear callbacks first to release all references
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop preview pipeline");
        }
        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        debug!(?result, ?state, "Preview pipeline stopped");

        self.playing.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.latest.lock() {
            *slot = None;
        }
    }
}

impl Drop for GstreamerPreview {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_direction_mapping() {
        assert_eq!(video_direction(PreviewRotation::None), "identity");
        assert_eq!(video_direction(PreviewRotation::Rotate90), "90r");
        assert_eq!(video_direction(PreviewRotation::Rotate180), "180");
        assert_eq!(video_direction(PreviewRotation::Rotate270), "90l");
    }

    #[test]
    fn test_pixel_format_mapping() {
        assert_eq!(pixel_format(VideoFormat::Rgba), PixelFormat::RGBA);
        assert_eq!(pixel_format(VideoFormat::Bgrx), PixelFormat::BGRA);
        assert_eq!(pixel_format(VideoFormat::Gray8), PixelFormat::Gray8);
    }
}
