// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing available cameras
//! - Scanning one barcode from a camera
//! - Decoding a barcode from an image file

use barcode_scanner::backends::camera::get_backend;
use barcode_scanner::config::Config;
use barcode_scanner::scanner::{
    ScanOptions, ScanOutcome, ScanResult, Scanner, ZxingDecoder, decode_image_file,
    parse_format_names,
};
use barcode_scanner::{BarcodeFormat, CameraDevice, EnclosurePanel, ScanError};
use std::path::PathBuf;

/// Flags of the `scan` command
pub struct ScanArgs {
    pub front: bool,
    pub try_harder: bool,
    pub formats: Option<Vec<String>>,
    pub json: bool,
}

/// Flags of the `decode` command
pub struct DecodeArgs {
    pub image: PathBuf,
    pub try_harder: bool,
    pub formats: Option<Vec<String>>,
    pub json: bool,
}

/// List all available cameras
pub fn list_cameras(virtual_images: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let backend_type = if virtual_images.is_empty() {
        config.backend
    } else {
        barcode_scanner::backends::camera::CameraBackendType::Virtual
    };
    let backend = get_backend(backend_type, virtual_images)?;
    let cameras = backend.enumerate_cameras()?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({}):", backend_type);
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        print_camera(index, camera);
    }

    Ok(())
}

fn print_camera(index: usize, camera: &CameraDevice) {
    println!("  [{}] {}", index, camera.name);
    let panel = match camera.panel {
        EnclosurePanel::Unknown => "external".to_string(),
        panel => panel.to_string(),
    };
    println!("      Panel: {}", panel);
    println!("      Id:    {}", camera.id);
    println!();
}

/// Scan one barcode from the camera
pub fn scan(args: ScanArgs, virtual_images: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();

    let options = ScanOptions {
        try_harder: args.try_harder.then_some(true),
        formats: parse_formats(args.formats.as_deref())?,
        prefer_front_camera: args.front,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let scanner = Scanner::from_config(&config, virtual_images)?;
        let handle = scanner.start(options);

        // Ctrl-C is back navigation
        let signals = handle.signals();
        ctrlc::set_handler(move || signals.back())?;

        if !args.json {
            println!("Scanning... press Ctrl-C to cancel");
        }
        Ok::<_, Box<dyn std::error::Error>>(handle.finished().await)
    })?;

    match outcome {
        ScanOutcome::Success(result) => print_result(&result, args.json),
        ScanOutcome::Failure(e) => Err(e.into()),
        ScanOutcome::Cancelled(reason) => {
            if args.json {
                println!("{}", serde_json::json!({ "cancelled": true }));
            } else {
                println!("Scan cancelled ({})", reason);
            }
            Ok(())
        }
    }
}

/// Decode a barcode from an image file
pub fn decode_image(args: DecodeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let options = ScanOptions {
        try_harder: args.try_harder.then_some(true),
        formats: parse_formats(args.formats.as_deref())?,
        ..Default::default()
    }
    .decode_options(config.try_harder);

    match decode_image_file(&ZxingDecoder::new(), &args.image, &options)? {
        Some(result) => print_result(&result, args.json),
        None => Err(format!("No barcode found in {}", args.image.display()).into()),
    }
}

fn print_result(result: &ScanResult, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        println!("{}: {}", result.format, result.text);
    }
    Ok(())
}

fn parse_formats(names: Option<&[String]>) -> Result<Option<Vec<BarcodeFormat>>, ScanError> {
    match names {
        Some(names) => parse_format_names(names),
        None => Ok(None),
    }
}
