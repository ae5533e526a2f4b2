// SPDX-License-Identifier: GPL-3.0-only

//! Scripted camera backend, display lock and decoders for integration tests

#![allow(dead_code)]

use barcode_scanner::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CameraDevice, CameraFrame,
    CameraSessionManager, EnclosurePanel, PixelFormat, PreviewEvent, PreviewEventSender,
    PreviewStream,
};
use barcode_scanner::backends::display::DisplayRequest;
use barcode_scanner::errors::DecodeError;
use barcode_scanner::scanner::{
    BarcodeDecoder, DecodeOptions, FrameBuffer, ScanResult, Scanner, SessionSettings,
};
use barcode_scanner::PreviewRotation;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use tokio::time::Instant;

/// What a fake preview does once started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewBehavior {
    /// Reports `Playing` and serves frames
    #[default]
    Normal,
    /// Never reports `Playing`
    NeverPlays,
    /// Reports `Playing`, then a device failure
    FailsAfterStart,
    /// Reports `Playing` but is not actually running
    NotPlaying,
    /// Blocks in `start` until [`Stats::release_start`], then plays
    SlowStart,
}

/// Counters shared by the fake backend, its previews and the display lock
#[derive(Debug, Default)]
pub struct Stats {
    pub previews_opened: AtomicUsize,
    pub previews_stopped: AtomicUsize,
    pub live_previews: AtomicUsize,
    pub max_live_previews: AtomicUsize,
    pub opened_devices: Mutex<Vec<String>>,
    pub rotations: Mutex<Vec<PreviewRotation>>,
    pub display_active: AtomicBool,
    pub display_requests: AtomicUsize,
    pub display_releases: AtomicUsize,
    pub starts_entered: AtomicUsize,
    start_released: Mutex<bool>,
    start_gate: Condvar,
}

impl Stats {
    pub fn opened(&self) -> usize {
        self.previews_opened.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.previews_stopped.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live_previews.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live_previews.load(Ordering::SeqCst)
    }

    pub fn rotations(&self) -> Vec<PreviewRotation> {
        self.rotations.lock().unwrap().clone()
    }

    pub fn opened_devices(&self) -> Vec<String> {
        self.opened_devices.lock().unwrap().clone()
    }

    pub fn display_active(&self) -> bool {
        self.display_active.load(Ordering::SeqCst)
    }

    pub fn starts_entered(&self) -> usize {
        self.starts_entered.load(Ordering::SeqCst)
    }

    /// Let every `SlowStart` preview finish starting
    pub fn release_start(&self) {
        *self.start_released.lock().unwrap() = true;
        self.start_gate.notify_all();
    }

    fn wait_for_start_release(&self) {
        let mut released = self.start_released.lock().unwrap();
        while !*released {
            released = self.start_gate.wait(released).unwrap();
        }
    }
}

pub struct FakeBackend {
    devices: Vec<CameraDevice>,
    behavior: PreviewBehavior,
    stats: Arc<Stats>,
}

impl FakeBackend {
    pub fn new(devices: Vec<CameraDevice>, behavior: PreviewBehavior, stats: Arc<Stats>) -> Self {
        Self {
            devices,
            behavior,
            stats,
        }
    }
}

impl CameraBackend for FakeBackend {
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        Ok(self.devices.clone())
    }

    fn open_preview(
        &mut self,
        device: &CameraDevice,
        events: PreviewEventSender,
    ) -> BackendResult<Box<dyn PreviewStream>> {
        if !self.devices.contains(device) {
            return Err(BackendError::DeviceNotFound(device.name.clone()));
        }
        self.stats.previews_opened.fetch_add(1, Ordering::SeqCst);
        self.stats.opened_devices.lock().unwrap().push(device.id.clone());
        Ok(Box::new(FakePreview {
            behavior: self.behavior,
            stats: Arc::clone(&self.stats),
            events,
            started: false,
            stopped: false,
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }
}

struct FakePreview {
    behavior: PreviewBehavior,
    stats: Arc<Stats>,
    events: PreviewEventSender,
    started: bool,
    stopped: bool,
}

impl PreviewStream for FakePreview {
    fn start(&mut self) -> BackendResult<()> {
        self.stats.starts_entered.fetch_add(1, Ordering::SeqCst);
        if self.behavior == PreviewBehavior::SlowStart {
            self.stats.wait_for_start_release();
        }
        self.started = true;
        let live = self.stats.live_previews.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_live_previews.fetch_max(live, Ordering::SeqCst);

        match self.behavior {
            PreviewBehavior::NeverPlays => {}
            PreviewBehavior::FailsAfterStart => {
                let _ = self.events.send(PreviewEvent::Playing);
                let _ = self.events.send(PreviewEvent::Failed("sensor unplugged".into()));
            }
            PreviewBehavior::Normal | PreviewBehavior::NotPlaying | PreviewBehavior::SlowStart => {
                let _ = self.events.send(PreviewEvent::Playing);
            }
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.started && !self.stopped && self.behavior != PreviewBehavior::NotPlaying
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        self.is_playing()
            .then(|| CameraFrame::packed(4, 4, PixelFormat::Gray8, vec![128; 16]))
    }

    fn set_rotation(&mut self, rotation: PreviewRotation) -> BackendResult<()> {
        self.stats.rotations.lock().unwrap().push(rotation);
        Ok(())
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.stats.previews_stopped.fetch_add(1, Ordering::SeqCst);
        if self.started {
            self.stats.live_previews.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

pub struct CountingDisplay {
    stats: Arc<Stats>,
}

impl DisplayRequest for CountingDisplay {
    fn request_active(&mut self) -> BackendResult<()> {
        self.stats.display_requests.fetch_add(1, Ordering::SeqCst);
        self.stats.display_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn request_release(&mut self) {
        if self.stats.display_active.swap(false, Ordering::SeqCst) {
            self.stats.display_releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.stats.display_active.load(Ordering::SeqCst)
    }
}

/// Decoder replaying a fixed list of responses, then `Ok(None)` forever
#[derive(Default)]
pub struct ScriptedDecoder {
    responses: Mutex<VecDeque<Result<Option<ScanResult>, DecodeError>>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedDecoder {
    pub fn new(responses: Vec<Result<Option<ScanResult>, DecodeError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `misses` empty frames, then `result`
    pub fn succeeding_after(misses: usize, result: ScanResult) -> Self {
        let mut responses: Vec<_> = (0..misses).map(|_| Ok(None)).collect();
        responses.push(Ok(Some(result)));
        Self::new(responses)
    }

    pub fn never_finds() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

impl BarcodeDecoder for ScriptedDecoder {
    fn decode(
        &self,
        frame: &FrameBuffer,
        _options: &DecodeOptions,
    ) -> Result<Option<ScanResult>, DecodeError> {
        assert_eq!(frame.data.len(), (frame.width * frame.height) as usize);
        self.calls.lock().unwrap().push(Instant::now());
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Decoder that panics on every frame
pub struct PanickingDecoder;

impl BarcodeDecoder for PanickingDecoder {
    fn decode(
        &self,
        _frame: &FrameBuffer,
        _options: &DecodeOptions,
    ) -> Result<Option<ScanResult>, DecodeError> {
        panic!("decoder crashed");
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// Decoder that blocks until released, then reports `result`
pub struct GatedDecoder {
    result: ScanResult,
    gate: Arc<(Mutex<bool>, Condvar)>,
    entered: AtomicUsize,
    finished: AtomicUsize,
}

impl GatedDecoder {
    pub fn new(result: ScanResult) -> Self {
        Self {
            result,
            gate: Arc::new((Mutex::new(false), Condvar::new())),
            entered: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        let (open, condvar) = &*self.gate;
        *open.lock().unwrap() = true;
        condvar.notify_all();
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl BarcodeDecoder for GatedDecoder {
    fn decode(
        &self,
        _frame: &FrameBuffer,
        _options: &DecodeOptions,
    ) -> Result<Option<ScanResult>, DecodeError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let (open, condvar) = &*self.gate;
        let mut released = open.lock().unwrap();
        while !*released {
            released = condvar.wait(released).unwrap();
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.result.clone()))
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

pub fn back_camera() -> CameraDevice {
    CameraDevice::new("Back Camera", "back", EnclosurePanel::Back)
}

pub fn front_camera() -> CameraDevice {
    CameraDevice::new("Front Camera", "front", EnclosurePanel::Front)
}

pub fn usb_camera() -> CameraDevice {
    CameraDevice::new("USB Camera", "usb", EnclosurePanel::Unknown)
}

/// Scanner over a fake backend, with default session settings
pub fn scanner(
    devices: Vec<CameraDevice>,
    behavior: PreviewBehavior,
    decoder: Arc<dyn BarcodeDecoder>,
) -> (Scanner, Arc<Stats>) {
    let stats = Arc::new(Stats::default());
    let backend = FakeBackend::new(devices, behavior, Arc::clone(&stats));
    let display = CountingDisplay {
        stats: Arc::clone(&stats),
    };
    let manager = CameraSessionManager::new(Box::new(backend), Box::new(display));
    (
        Scanner::new(manager, decoder, SessionSettings::default()),
        stats,
    )
}
