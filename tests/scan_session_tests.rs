// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the scan loop, run on a paused Tokio clock

mod common;

use barcode_scanner::errors::DecodeError;
use barcode_scanner::scanner::{ScanState, StopKind};
use barcode_scanner::{
    BarcodeFormat, CancelReason, DeviceError, DisplayOrientation, PreviewRotation, ScanError,
    ScanOptions, ScanOutcome, ScanResult,
};
use common::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Callback invocations of one `scan()` call
#[derive(Default)]
struct Callbacks {
    successes: Mutex<Vec<ScanResult>>,
    failures: Mutex<Vec<ScanError>>,
}

impl Callbacks {
    fn successes(&self) -> Vec<ScanResult> {
        self.successes.lock().unwrap().clone()
    }

    fn failures(&self) -> Vec<ScanError> {
        self.failures.lock().unwrap().clone()
    }
}

fn scan_with_callbacks(
    scanner: &barcode_scanner::Scanner,
    options: ScanOptions,
) -> (barcode_scanner::ScanHandle, Arc<Callbacks>) {
    let callbacks = Arc::new(Callbacks::default());
    let on_success = Arc::clone(&callbacks);
    let on_fail = Arc::clone(&callbacks);
    let handle = scanner.scan(
        move |result| on_success.successes.lock().unwrap().push(result),
        move |error| on_fail.failures.lock().unwrap().push(error),
        options,
    );
    (handle, callbacks)
}

#[tokio::test(start_paused = true)]
async fn test_success_after_retries() {
    let decoder = Arc::new(ScriptedDecoder::succeeding_after(
        3,
        ScanResult::new("hello", BarcodeFormat::QrCode),
    ));
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder.clone());

    let outcome = scanner.run(ScanOptions::default()).await;

    assert_eq!(
        outcome,
        ScanOutcome::Success(ScanResult::new("hello", BarcodeFormat::QrCode))
    );
    assert_eq!(decoder.calls(), 4);

    // No sampling after success
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(decoder.calls(), 4);

    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.stopped(), 1);
    assert_eq!(stats.live(), 0);
    assert!(!stats.display_active());
}

#[tokio::test(start_paused = true)]
async fn test_ean13_on_third_sample_fires_success_once() {
    let decoder = Arc::new(ScriptedDecoder::succeeding_after(
        2,
        ScanResult::new("123456", BarcodeFormat::Ean13),
    ));
    let (scanner, _stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder.clone());

    let (handle, callbacks) = scan_with_callbacks(&scanner, ScanOptions::default());
    let outcome = handle.finished().await;

    assert!(matches!(outcome, ScanOutcome::Success(_)));
    assert_eq!(decoder.calls(), 3);
    assert_eq!(
        callbacks.successes(),
        vec![ScanResult {
            text: "123456".into(),
            format: BarcodeFormat::Ean13,
            cancelled: false,
        }]
    );
    assert!(callbacks.failures().is_empty());

    let json = serde_json::to_value(&callbacks.successes()[0]).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"text": "123456", "format": "EAN_13", "cancelled": false})
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_success_fires_no_callback() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder.clone());

    let (handle, callbacks) = scan_with_callbacks(&scanner, ScanOptions::default());
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(decoder.calls() >= 2);
    assert!(stats.display_active());

    handle.back();
    let outcome = handle.finished().await;

    assert_eq!(outcome, ScanOutcome::Cancelled(CancelReason::BackNavigation));
    assert!(callbacks.successes().is_empty());
    assert!(callbacks.failures().is_empty());
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.stopped(), 1);
    assert!(!stats.display_active());
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_suspend_cancel() {
    for (signal, reason) in [
        ("pause", CancelReason::AppPaused),
        ("suspend", CancelReason::AppSuspended),
    ] {
        let decoder = Arc::new(ScriptedDecoder::never_finds());
        let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder);

        let handle = scanner.start(ScanOptions::default());
        tokio::time::sleep(Duration::from_millis(150)).await;
        match signal {
            "pause" => handle.pause(),
            _ => handle.suspend(),
        }

        assert_eq!(handle.finished().await, ScanOutcome::Cancelled(reason));
        assert_eq!(stats.live(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_devices_fails_without_previewing() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(Vec::new(), PreviewBehavior::Normal, decoder.clone());

    let (handle, callbacks) = scan_with_callbacks(&scanner, ScanOptions::default());
    let signals = handle.signals();
    let outcome = handle.finished().await;

    let expected = ScanError::DeviceUnavailable(DeviceError::NoCameraFound);
    assert_eq!(outcome, ScanOutcome::Failure(expected.clone()));
    assert_eq!(callbacks.failures(), vec![expected]);
    assert!(callbacks.successes().is_empty());
    assert_eq!(stats.opened(), 0);
    assert_eq!(decoder.calls(), 0);
    assert_eq!(stats.display_requests.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(signals.state(), ScanState::Stopped(StopKind::Failure));
}

#[tokio::test(start_paused = true)]
async fn test_sampling_cadence() {
    let decoder = Arc::new(ScriptedDecoder::succeeding_after(
        5,
        ScanResult::new("late", BarcodeFormat::QrCode),
    ));
    let (scanner, _stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder.clone());

    scanner.run(ScanOptions::default()).await;

    let times = decoder.call_times();
    assert_eq!(times.len(), 6);
    for pair in times.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_millis(100));
    }
}

#[tokio::test(start_paused = true)]
async fn test_sampling_continues_until_cancelled() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, _stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder.clone());

    let handle = scanner.start(ScanOptions::default());
    tokio::time::sleep(Duration::from_millis(1050)).await;
    handle.back();
    handle.finished().await;

    // Ticks at 0, 100, ..., 1000 ms
    assert_eq!(decoder.calls(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_new_scan_supersedes_previous() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder);

    let first = scanner.start(ScanOptions::default());
    tokio::time::sleep(Duration::from_millis(150)).await;
    let second = scanner.start(ScanOptions::default());
    let third = scanner.start(ScanOptions::default());

    assert_eq!(
        first.finished().await,
        ScanOutcome::Cancelled(CancelReason::Superseded)
    );
    assert_eq!(
        second.finished().await,
        ScanOutcome::Cancelled(CancelReason::Superseded)
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    third.back();
    assert_eq!(
        third.finished().await,
        ScanOutcome::Cancelled(CancelReason::BackNavigation)
    );

    assert_eq!(stats.max_live(), 1);
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.opened(), stats.stopped());
}

#[tokio::test(start_paused = true)]
async fn test_decoder_error_fails_scan() {
    let decoder = Arc::new(ScriptedDecoder::new(vec![
        Ok(None),
        Err(DecodeError::new("corrupt bitstream")),
    ]));
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder.clone());

    let (handle, callbacks) = scan_with_callbacks(&scanner, ScanOptions::default());
    let outcome = handle.finished().await;

    let expected = ScanError::DecodeLibrary("corrupt bitstream".into());
    assert_eq!(outcome, ScanOutcome::Failure(expected.clone()));
    assert_eq!(callbacks.failures(), vec![expected]);
    assert_eq!(decoder.calls(), 2);
    assert_eq!(stats.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_decoder_panic_fails_scan() {
    let (scanner, stats) = scanner(
        vec![back_camera()],
        PreviewBehavior::Normal,
        Arc::new(PanickingDecoder),
    );

    let outcome = scanner.run(ScanOptions::default()).await;

    assert!(matches!(
        outcome,
        ScanOutcome::Failure(ScanError::DecodeLibrary(_))
    ));
    assert_eq!(stats.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_device_failure_after_start() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(
        vec![back_camera()],
        PreviewBehavior::FailsAfterStart,
        decoder,
    );

    let outcome = scanner.run(ScanOptions::default()).await;

    assert_eq!(
        outcome,
        ScanOutcome::Failure(ScanError::DeviceFailed("sensor unplugged".into()))
    );
    assert_eq!(stats.stopped(), 1);
    assert!(!stats.display_active());
}

#[tokio::test(start_paused = true)]
async fn test_preview_start_timeout() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::NeverPlays, decoder.clone());

    let outcome = scanner.run(ScanOptions::default()).await;

    assert_eq!(
        outcome,
        ScanOutcome::Failure(ScanError::DeviceUnavailable(DeviceError::PreviewTimeout))
    );
    assert_eq!(decoder.calls(), 0);
    assert_eq!(stats.stopped(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sampling_while_not_previewing_fails() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::NotPlaying, decoder.clone());

    let outcome = scanner.run(ScanOptions::default()).await;

    assert_eq!(outcome, ScanOutcome::Failure(ScanError::NotPreviewing));
    assert_eq!(decoder.calls(), 0);
    assert_eq!(stats.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_discards_in_flight_decode() {
    let decoder = Arc::new(GatedDecoder::new(ScanResult::new(
        "too late",
        BarcodeFormat::QrCode,
    )));
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder.clone());

    let (handle, callbacks) = scan_with_callbacks(&scanner, ScanOptions::default());
    let mut state = handle.signals().subscribe();
    state
        .wait_for(|s| *s == ScanState::Decoding)
        .await
        .unwrap();

    handle.back();
    let outcome = handle.finished().await;
    assert_eq!(outcome, ScanOutcome::Cancelled(CancelReason::BackNavigation));
    assert_eq!(stats.live(), 0);

    // Let the worker finish; its result must go nowhere
    decoder.release();
    while decoder.finished() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(callbacks.successes().is_empty());
    assert!(callbacks.failures().is_empty());
    assert_eq!(decoder.entered(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_camera_opens() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::SlowStart, decoder.clone());

    let handle = scanner.start(ScanOptions::default());
    // The controller task keeps running while the preview is stuck starting
    while stats.starts_entered() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(handle.state(), ScanState::Initializing);

    handle.back();
    handle.orientation_changed(DisplayOrientation::Portrait);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(handle.state(), ScanState::Initializing);

    stats.release_start();
    let outcome = handle.finished().await;

    assert_eq!(outcome, ScanOutcome::Cancelled(CancelReason::BackNavigation));
    assert_eq!(decoder.calls(), 0);
    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.stopped(), 1);
    assert_eq!(stats.live(), 0);
    assert!(stats.rotations().is_empty());
    assert!(!stats.display_active());
}

#[tokio::test(start_paused = true)]
async fn test_orientation_change_rotates_preview() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(vec![front_camera()], PreviewBehavior::Normal, decoder);

    let handle = scanner.start(ScanOptions::default());
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.orientation_changed(DisplayOrientation::Portrait);
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.back();
    handle.finished().await;

    // Front camera is mirrored: portrait (90) becomes 270
    assert_eq!(
        stats.rotations(),
        vec![PreviewRotation::None, PreviewRotation::Rotate270]
    );
}

#[tokio::test(start_paused = true)]
async fn test_orientation_before_preview_is_applied_on_start() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder);

    let handle = scanner.start(ScanOptions::default());
    handle.orientation_changed(DisplayOrientation::Portrait);
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.back();
    handle.finished().await;

    assert_eq!(stats.rotations(), vec![PreviewRotation::Rotate90]);
}

#[tokio::test(start_paused = true)]
async fn test_external_camera_is_never_rotated() {
    let decoder = Arc::new(ScriptedDecoder::never_finds());
    let (scanner, stats) = scanner(vec![usb_camera()], PreviewBehavior::Normal, decoder);

    let handle = scanner.start(ScanOptions::default());
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.orientation_changed(DisplayOrientation::PortraitFlipped);
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.back();
    handle.finished().await;

    assert!(stats.rotations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_camera_selection() {
    let found = ScanResult::new("x", BarcodeFormat::QrCode);
    let decoder = Arc::new(ScriptedDecoder::new(vec![
        Ok(Some(found.clone())),
        Ok(Some(found)),
    ]));
    let (scanner, stats) = scanner(
        vec![front_camera(), back_camera()],
        PreviewBehavior::Normal,
        decoder.clone(),
    );

    scanner.run(ScanOptions::default()).await;
    scanner
        .run(ScanOptions {
            prefer_front_camera: true,
            ..Default::default()
        })
        .await;

    assert_eq!(stats.opened_devices(), vec!["back", "front"]);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_to_first_camera() {
    let decoder = Arc::new(ScriptedDecoder::succeeding_after(
        0,
        ScanResult::new("x", BarcodeFormat::QrCode),
    ));
    let (scanner, stats) = scanner(
        vec![usb_camera(), front_camera()],
        PreviewBehavior::Normal,
        decoder,
    );

    scanner.run(ScanOptions::default()).await;

    assert_eq!(stats.opened_devices(), vec!["usb"]);
}

#[tokio::test(start_paused = true)]
async fn test_signals_after_finish_are_ignored() {
    let decoder = Arc::new(ScriptedDecoder::succeeding_after(
        0,
        ScanResult::new("done", BarcodeFormat::QrCode),
    ));
    let (scanner, stats) = scanner(vec![back_camera()], PreviewBehavior::Normal, decoder);

    let handle = scanner.start(ScanOptions::default());
    let signals = handle.signals();
    handle.finished().await;

    assert_eq!(signals.state(), ScanState::Stopped(StopKind::Success));
    signals.back();
    signals.orientation_changed(DisplayOrientation::Portrait);
    assert_eq!(stats.stopped(), 1);
    assert_eq!(
        stats.display_releases.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}
