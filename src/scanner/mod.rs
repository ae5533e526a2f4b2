// SPDX-License-Identifier: GPL-3.0-only

//! Barcode scanning
//!
//! [`Scanner`] is the entry point. Each call to [`Scanner::scan`] spawns one
//! controller task which opens the camera, samples preview frames at a fixed
//! interval and hands them to the decoder until something is found, an error
//! occurs or the scan is cancelled through its [`ScanHandle`].

pub mod decoder;
pub mod frame_sampler;
pub mod options;
pub mod session;
pub mod types;

pub use decoder::{BarcodeDecoder, QrDecoder, ZxingDecoder, decode_image_file};
pub use frame_sampler::{FrameBuffer, FrameSampler};
pub use options::{DecodeOptions, ScanOptions, parse_format_names};
pub use session::{ControlEvent, ControlSender, ScanSessionController, SessionSettings};
pub use types::{BarcodeFormat, CancelReason, ScanOutcome, ScanResult, ScanState, StopKind};

use crate::backends::camera::{CameraBackendType, CameraSessionManager, get_backend};
use crate::backends::display::{DisplayRequest, NoopDisplayRequest, ScreenSaverInhibitor};
use crate::config::Config;
use crate::errors::{AppResult, ScanError};
use crate::orientation::DisplayOrientation;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cloneable control surface of a running scan
#[derive(Debug, Clone)]
pub struct ScanSignals {
    control: ControlSender,
    state: watch::Receiver<ScanState>,
}

impl ScanSignals {
    /// Back navigation; cancels the scan
    pub fn back(&self) {
        self.cancel(CancelReason::BackNavigation);
    }

    /// Application lost focus; cancels the scan
    pub fn pause(&self) {
        self.cancel(CancelReason::AppPaused);
    }

    /// Application is being suspended; cancels the scan
    pub fn suspend(&self) {
        self.cancel(CancelReason::AppSuspended);
    }

    pub fn cancel(&self, reason: CancelReason) {
        self.send(ControlEvent::Cancel(reason));
    }

    /// The platform reported a new display orientation
    pub fn orientation_changed(&self, orientation: DisplayOrientation) {
        self.send(ControlEvent::OrientationChanged(orientation));
    }

    /// Current state of the scan
    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    /// Receiver for state changes
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    fn send(&self, event: ControlEvent) {
        // The controller is gone once the scan has stopped
        if self.control.send(event).is_err() {
            debug!(?event, "Scan already finished, ignoring signal");
        }
    }
}

/// Handle to one scan
#[derive(Debug)]
pub struct ScanHandle {
    signals: ScanSignals,
    join: JoinHandle<ScanOutcome>,
}

impl ScanHandle {
    pub fn signals(&self) -> ScanSignals {
        self.signals.clone()
    }

    pub fn back(&self) {
        self.signals.back();
    }

    pub fn pause(&self) {
        self.signals.pause();
    }

    pub fn suspend(&self) {
        self.signals.suspend();
    }

    pub fn orientation_changed(&self, orientation: DisplayOrientation) {
        self.signals.orientation_changed(orientation);
    }

    pub fn state(&self) -> ScanState {
        self.signals.state()
    }

    /// Wait for the scan to end
    ///
    /// The camera has been released by the time this returns.
    pub async fn finished(self) -> ScanOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Scan task ended abnormally");
                ScanOutcome::Cancelled(CancelReason::Aborted)
            }
        }
    }
}

type Completion = Box<dyn FnOnce(&ScanOutcome) + Send>;

/// Runs barcode scans against one camera backend
///
/// Scans never overlap: starting a new one cancels the scan in flight, and
/// the new scan only opens the camera after the old one has torn down.
pub struct Scanner {
    manager: Arc<Mutex<CameraSessionManager>>,
    decoder: Arc<dyn BarcodeDecoder>,
    settings: SessionSettings,
    current: std::sync::Mutex<Option<ScanSignals>>,
}

impl Scanner {
    pub fn new(
        manager: CameraSessionManager,
        decoder: Arc<dyn BarcodeDecoder>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            decoder,
            settings,
            current: std::sync::Mutex::new(None),
        }
    }

    /// Build a scanner from configuration
    ///
    /// With `virtual_images`, the virtual camera replays those images
    /// instead of using the configured backend.
    pub fn from_config(config: &Config, virtual_images: &[PathBuf]) -> AppResult<Self> {
        let backend_type = if virtual_images.is_empty() {
            config.backend
        } else {
            CameraBackendType::Virtual
        };
        let backend = get_backend(backend_type, virtual_images)?;

        let display: Box<dyn DisplayRequest> = if config.inhibit_screensaver {
            Box::new(ScreenSaverInhibitor::new())
        } else {
            Box::new(NoopDisplayRequest::default())
        };

        Ok(Self::new(
            CameraSessionManager::new(backend, display),
            Arc::new(ZxingDecoder::new()),
            config.session_settings(),
        ))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Start a scan, reporting through callbacks
    ///
    /// Exactly one of `success` or `fail` is called, unless the scan is
    /// cancelled, in which case neither is. Must be called within a Tokio
    /// runtime.
    pub fn scan<S, F>(&self, success: S, fail: F, options: ScanOptions) -> ScanHandle
    where
        S: FnOnce(ScanResult) + Send + 'static,
        F: FnOnce(ScanError) + Send + 'static,
    {
        self.spawn(
            options,
            Some(Box::new(move |outcome: &ScanOutcome| match outcome {
                ScanOutcome::Success(result) => success(result.clone()),
                ScanOutcome::Failure(error) => fail(error.clone()),
                ScanOutcome::Cancelled(reason) => {
                    debug!(%reason, "Scan cancelled, no callback");
                }
            })),
        )
    }

    /// Start a scan and return its handle
    pub fn start(&self, options: ScanOptions) -> ScanHandle {
        self.spawn(options, None)
    }

    /// Run a scan to completion
    pub async fn run(&self, options: ScanOptions) -> ScanOutcome {
        self.start(options).finished().await
    }

    /// Cancel the scan in flight, if any
    pub fn cancel_current(&self, reason: CancelReason) {
        if let Ok(current) = self.current.lock()
            && let Some(signals) = current.as_ref()
        {
            signals.cancel(reason);
        }
    }

    fn spawn(&self, options: ScanOptions, completion: Option<Completion>) -> ScanHandle {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ScanState::Idle);
        let signals = ScanSignals {
            control: control_tx,
            state: state_rx,
        };

        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(signals.clone())
                && !previous.is_finished()
            {
                info!("Cancelling previous scan");
                previous.cancel(CancelReason::Superseded);
            }
        }

        let decode_options = options.decode_options(self.settings.default_try_harder);
        let panel = options.preferred_panel(self.settings.preferred_panel);
        let manager = Arc::clone(&self.manager);
        let decoder = Arc::clone(&self.decoder);
        let settings = self.settings.clone();

        info!(
            ?panel,
            try_harder = decode_options.try_harder,
            formats = ?decode_options.formats,
            "Starting scan"
        );

        let join = tokio::spawn(async move {
            // Waits for any previous scan to release the camera
            let manager = manager.lock_owned().await;
            let controller = ScanSessionController::new(
                manager,
                decoder,
                &settings,
                decode_options,
                panel,
                state_tx,
            );
            let outcome = controller.run(control_rx).await;
            if let Some(completion) = completion {
                completion(&outcome);
            }
            outcome
        });

        ScanHandle { signals, join }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.cancel_current(CancelReason::Aborted);
    }
}
