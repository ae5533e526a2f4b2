// SPDX-License-Identifier: GPL-3.0-only

//! Scan session controller
//!
//! One controller drives one scan from camera open to teardown:
//!
//! ```text
//! Idle → Initializing → Previewing ⇄ Decoding → Stopped(Success | Failure | Cancelled)
//! ```
//!
//! All inputs (control signals, preview events and the sampling timer) are
//! handled by a single `select!` loop, so controller state is never touched
//! concurrently. Opening and closing the camera wait on the device and the
//! session bus, so both run on the blocking pool while the loop keeps
//! listening. Every exit goes through [`ScanSessionController::teardown`].

use super::decoder::BarcodeDecoder;
use super::frame_sampler::FrameSampler;
use super::options::DecodeOptions;
use super::types::{CancelReason, ScanOutcome, ScanState, StopKind};
use crate::backends::camera::{
    CameraSessionManager, EnclosurePanel, PreviewEvent, PreviewEventReceiver, PreviewEventSender,
};
use crate::constants::{sampling, timing};
use crate::errors::{DeviceError, ScanError};
use crate::orientation::{DisplayOrientation, OrientationAdapter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, mpsc, watch};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info, warn};

/// Timing and geometry shared by every scan of a [`Scanner`](super::Scanner)
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Delay between the end of one decode attempt and the next sample
    pub sample_interval: Duration,
    /// How long the preview may take to report that it is playing
    pub preview_start_timeout: Duration,
    /// Orientation assumed until the platform reports one
    pub initial_orientation: DisplayOrientation,
    pub max_sample_dimension: u32,
    /// Panel to prefer unless the caller asks for the front camera
    pub preferred_panel: EnclosurePanel,
    /// `try_harder` for callers that do not set it
    pub default_try_harder: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sample_interval: timing::sample_interval(),
            preview_start_timeout: Duration::from_secs(timing::PREVIEW_START_TIMEOUT_SECS),
            initial_orientation: DisplayOrientation::default(),
            max_sample_dimension: sampling::MAX_SAMPLE_DIMENSION,
            preferred_panel: EnclosurePanel::Back,
            default_try_harder: true,
        }
    }
}

/// External signals delivered to a running scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Cancel(CancelReason),
    OrientationChanged(DisplayOrientation),
}

pub type ControlSender = mpsc::UnboundedSender<ControlEvent>;
pub type ControlReceiver = mpsc::UnboundedReceiver<ControlEvent>;

/// Drives a single scan
///
/// Holds the camera session manager lock for its whole lifetime, so only one
/// controller can have a camera open at a time. The guard is lent to the
/// blocking pool while the camera opens or closes.
pub struct ScanSessionController {
    manager: Option<OwnedMutexGuard<CameraSessionManager>>,
    decoder: Arc<dyn BarcodeDecoder>,
    sampler: FrameSampler,
    decode_options: DecodeOptions,
    panel: EnclosurePanel,
    sample_interval: Duration,
    preview_start_timeout: Duration,
    orientation: OrientationAdapter,
    state: watch::Sender<ScanState>,
    attempts: u32,
    torn_down: bool,
}

impl ScanSessionController {
    pub fn new(
        manager: OwnedMutexGuard<CameraSessionManager>,
        decoder: Arc<dyn BarcodeDecoder>,
        settings: &SessionSettings,
        decode_options: DecodeOptions,
        panel: EnclosurePanel,
        state: watch::Sender<ScanState>,
    ) -> Self {
        Self {
            manager: Some(manager),
            decoder,
            sampler: FrameSampler::new(settings.max_sample_dimension),
            decode_options,
            panel,
            sample_interval: settings.sample_interval,
            preview_start_timeout: settings.preview_start_timeout,
            orientation: OrientationAdapter::new(settings.initial_orientation),
            state,
            attempts: 0,
            torn_down: false,
        }
    }

    /// Run the scan to completion
    ///
    /// The camera is closed and the state set to `Stopped` before this
    /// returns.
    pub async fn run(mut self, mut control: ControlReceiver) -> ScanOutcome {
        let outcome = self.drive(&mut control).await;
        control.close();
        self.teardown(outcome.stop_kind()).await;

        match &outcome {
            ScanOutcome::Success(result) => {
                info!(format = %result.format, attempts = self.attempts, "Scan succeeded")
            }
            ScanOutcome::Failure(e) => warn!(error = %e, attempts = self.attempts, "Scan failed"),
            ScanOutcome::Cancelled(reason) => {
                info!(%reason, attempts = self.attempts, "Scan cancelled")
            }
        }
        outcome
    }

    async fn drive(&mut self, control: &mut ControlReceiver) -> ScanOutcome {
        self.set_state(ScanState::Initializing);

        // Signals sent before this task got the camera
        while let Ok(event) = control.try_recv() {
            match event {
                ControlEvent::Cancel(reason) => return ScanOutcome::Cancelled(reason),
                ControlEvent::OrientationChanged(o) => {
                    let _ = self.orientation.on_orientation_changed(o, None);
                }
            }
        }

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let (external, mirroring) = match self.open_camera(control, events_tx).await {
            Ok(flags) => flags,
            Err(outcome) => return outcome,
        };
        self.orientation.configure(external, mirroring);

        if let Err(outcome) = self.wait_for_preview(control, &mut events).await {
            return outcome;
        }

        self.set_state(ScanState::Previewing);
        self.apply_rotation();

        let mut events_open = true;
        let mut next_tick = Instant::now();
        loop {
            tokio::select! {
                biased;

                event = control.recv() => match event {
                    Some(ControlEvent::Cancel(reason)) => return ScanOutcome::Cancelled(reason),
                    Some(ControlEvent::OrientationChanged(o)) => self.on_orientation_changed(o),
                    None => return ScanOutcome::Cancelled(CancelReason::Aborted),
                },

                event = events.recv(), if events_open => match event {
                    Some(PreviewEvent::Failed(msg)) => {
                        return ScanOutcome::Failure(ScanError::DeviceFailed(msg));
                    }
                    Some(PreviewEvent::Stopped) => {
                        return ScanOutcome::Failure(ScanError::DeviceFailed(
                            "Preview stopped unexpectedly".into(),
                        ));
                    }
                    Some(PreviewEvent::Playing) => {}
                    None => {
                        debug!("Preview event channel closed");
                        events_open = false;
                    }
                },

                () = sleep_until(next_tick) => {
                    if let Some(outcome) = self.sample_and_decode(control).await {
                        return outcome;
                    }
                    // Re-armed only after the attempt finished
                    next_tick = Instant::now() + self.sample_interval;
                }
            }
        }
    }

    /// Open the camera on the blocking pool
    ///
    /// A cancel received meanwhile is honoured once the open returns, so the
    /// session it produced is closed by teardown. Returns the external and
    /// mirroring flags of the session.
    async fn open_camera(
        &mut self,
        control: &mut ControlReceiver,
        events: PreviewEventSender,
    ) -> Result<(bool, bool), ScanOutcome> {
        let Some(mut manager) = self.manager.take() else {
            return Err(ScanOutcome::Failure(ScanError::NotPreviewing));
        };
        let panel = self.panel;
        let mut job = tokio::task::spawn_blocking(move || {
            let opened = manager
                .open(panel, events)
                .map(|session| (session.is_external(), session.is_mirroring()));
            (manager, opened)
        });

        let mut cancelled = None;
        let joined = loop {
            tokio::select! {
                biased;

                event = control.recv(), if cancelled.is_none() => match event {
                    Some(ControlEvent::Cancel(reason)) => {
                        debug!(%reason, "Cancel received while the camera opens");
                        cancelled = Some(reason);
                    }
                    Some(ControlEvent::OrientationChanged(o)) => {
                        let _ = self.orientation.on_orientation_changed(o, None);
                    }
                    None => cancelled = Some(CancelReason::Aborted),
                },

                joined = &mut job => break joined,
            }
        };

        let (manager, opened) = joined.map_err(|e| {
            warn!(error = %e, "Camera open worker panicked");
            ScanOutcome::Failure(ScanError::DeviceFailed("camera open worker panicked".into()))
        })?;
        self.manager = Some(manager);

        if let Some(reason) = cancelled {
            return Err(ScanOutcome::Cancelled(reason));
        }
        opened.map_err(ScanOutcome::Failure)
    }

    /// Wait until the preview reports that it is playing
    async fn wait_for_preview(
        &mut self,
        control: &mut ControlReceiver,
        events: &mut PreviewEventReceiver,
    ) -> Result<(), ScanOutcome> {
        let deadline = sleep(self.preview_start_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                event = control.recv() => match event {
                    Some(ControlEvent::Cancel(reason)) => return Err(ScanOutcome::Cancelled(reason)),
                    // Remembered and applied once the preview is up
                    Some(ControlEvent::OrientationChanged(o)) => {
                        let _ = self.orientation.on_orientation_changed(o, None);
                    }
                    None => return Err(ScanOutcome::Cancelled(CancelReason::Aborted)),
                },

                event = events.recv() => match event {
                    Some(PreviewEvent::Playing) => return Ok(()),
                    Some(PreviewEvent::Failed(msg)) => {
                        return Err(ScanOutcome::Failure(ScanError::DeviceFailed(msg)));
                    }
                    Some(PreviewEvent::Stopped) | None => {
                        return Err(ScanOutcome::Failure(ScanError::DeviceFailed(
                            "Preview stopped before it started".into(),
                        )));
                    }
                },

                () = &mut deadline => {
                    warn!(timeout = ?self.preview_start_timeout, "Preview did not start");
                    return Err(ScanOutcome::Failure(DeviceError::PreviewTimeout.into()));
                }
            }
        }
    }

    /// Sample one frame and decode it on the blocking pool
    ///
    /// Returns `None` when nothing was found and the scan should go on.
    async fn sample_and_decode(&mut self, control: &mut ControlReceiver) -> Option<ScanOutcome> {
        self.set_state(ScanState::Decoding);
        self.attempts += 1;

        let sampled = match self.manager.as_ref().and_then(|manager| manager.session()) {
            Some(session) if session.is_active() => self.sampler.sample_frame(session.preview()),
            _ => Err(ScanError::NotPreviewing),
        };
        let frame = match sampled {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.set_state(ScanState::Previewing);
                return None;
            }
            Err(e) => return Some(ScanOutcome::Failure(e)),
        };

        debug!(
            attempt = self.attempts,
            width = frame.width,
            height = frame.height,
            decoder = self.decoder.name(),
            "Decoding frame"
        );

        let decoder = Arc::clone(&self.decoder);
        let options = self.decode_options.clone();
        // The frame is moved into the worker and dropped when it returns
        let mut job = tokio::task::spawn_blocking(move || decoder.decode(&frame, &options));

        loop {
            tokio::select! {
                biased;

                event = control.recv() => match event {
                    Some(ControlEvent::OrientationChanged(o)) => self.on_orientation_changed(o),
                    Some(ControlEvent::Cancel(reason)) => {
                        debug!(attempt = self.attempts, "Discarding in-flight decode");
                        return Some(ScanOutcome::Cancelled(reason));
                    }
                    None => return Some(ScanOutcome::Cancelled(CancelReason::Aborted)),
                },

                joined = &mut job => {
                    return match joined {
                        Ok(Ok(Some(result))) => Some(ScanOutcome::Success(result)),
                        Ok(Ok(None)) => {
                            self.set_state(ScanState::Previewing);
                            None
                        }
                        Ok(Err(e)) => Some(ScanOutcome::Failure(e.into())),
                        Err(e) => {
                            warn!(error = %e, "Decoder worker panicked");
                            Some(ScanOutcome::Failure(ScanError::DecodeLibrary(
                                "decoder worker panicked".into(),
                            )))
                        }
                    };
                }
            }
        }
    }

    fn on_orientation_changed(&mut self, orientation: DisplayOrientation) {
        let preview = self
            .manager
            .as_mut()
            .and_then(|manager| manager.session_mut())
            .map(|session| session.preview_mut());
        if let Err(e) = self.orientation.on_orientation_changed(orientation, preview) {
            warn!(error = %e, "Failed to rotate preview");
        }
    }

    fn apply_rotation(&mut self) {
        if let Some(session) = self.manager.as_mut().and_then(|manager| manager.session_mut())
            && let Err(e) = self.orientation.apply(session.preview_mut())
        {
            warn!(error = %e, "Failed to rotate preview");
        }
    }

    fn set_state(&self, state: ScanState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Scan state changed");
        }
    }

    /// Close the camera on the blocking pool and mark the scan stopped. Runs once.
    async fn teardown(&mut self, kind: StopKind) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        match self.manager.take() {
            Some(mut manager) if manager.is_open() => {
                let closed = tokio::task::spawn_blocking(move || {
                    manager.close();
                    manager
                })
                .await;
                match closed {
                    Ok(manager) => self.manager = Some(manager),
                    Err(e) => warn!(error = %e, "Camera close worker panicked"),
                }
            }
            manager => {
                debug!("No camera session to close");
                self.manager = manager;
            }
        }
        self.set_state(ScanState::Stopped(kind));
    }
}

impl Drop for ScanSessionController {
    fn drop(&mut self) {
        // Reached without run() finishing when the scan task is aborted
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(mut manager) = self.manager.take()
            && manager.is_open()
        {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn_blocking(move || manager.close());
                }
                Err(_) => {
                    manager.close();
                }
            }
        }
        self.set_state(ScanState::Stopped(StopKind::Cancelled));
    }
}
