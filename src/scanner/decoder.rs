// SPDX-License-Identifier: GPL-3.0-only

//! Decode adapter
//!
//! [`BarcodeDecoder`] is the seam to the decoding library. Finding no symbol
//! is the normal case and is reported as `Ok(None)`; only failures of the
//! library itself are errors.
//!
//! [`ZxingDecoder`] reads every ZXing symbology through `rxing`, after a
//! fast QR pass with `rqrr`. [`QrDecoder`] is that QR pass on its own.

use super::frame_sampler::FrameBuffer;
use super::options::DecodeOptions;
use super::types::{BarcodeFormat, ScanResult};
use crate::errors::{DecodeError, ScanError};
use image::GrayImage;
use rxing::common::HybridBinarizer;
use rxing::{
    BinaryBitmap, DecodeHintType, DecodeHintValue, DecodingHintDictionary, Luma8LuminanceSource,
    MultiFormatReader, Reader,
};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, trace};

/// A barcode decoding library
pub trait BarcodeDecoder: Send + Sync {
    /// Look for a barcode in `frame`
    ///
    /// Returns `Ok(None)` when there is no symbol, or only symbols whose
    /// format `options` does not accept.
    fn decode(
        &self,
        frame: &FrameBuffer,
        options: &DecodeOptions,
    ) -> Result<Option<ScanResult>, DecodeError>;

    /// Human readable name for logs
    fn name(&self) -> &'static str;
}

/// QR code decoder backed by `rqrr`
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }

    fn scan_luma(&self, luma: &GrayImage, invert: bool) -> Option<String> {
        let (width, height) = luma.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                let value = luma.get_pixel(x as u32, y as u32).0[0];
                if invert { 255 - value } else { value }
            });

        let grids = prepared.detect_grids();
        trace!(count = grids.len(), invert, "QR grids detected");

        grids.iter().find_map(|grid| match grid.decode() {
            Ok((meta, content)) => {
                debug!(version = meta.version.0, ecc = meta.ecc_level, "Decoded QR code");
                Some(content)
            }
            Err(e) => {
                debug!(error = %e, "Failed to decode QR grid");
                None
            }
        })
    }

    /// Look for a QR code, and with `try_harder` for an inverted one too
    fn find(&self, luma: &GrayImage, try_harder: bool) -> Option<String> {
        let content = self.scan_luma(luma, false);
        if content.is_none() && try_harder {
            // Light-on-dark codes only show up inverted
            return self.scan_luma(luma, true);
        }
        content
    }
}

impl BarcodeDecoder for QrDecoder {
    fn decode(
        &self,
        frame: &FrameBuffer,
        options: &DecodeOptions,
    ) -> Result<Option<ScanResult>, DecodeError> {
        if !options.accepts(BarcodeFormat::QrCode) {
            trace!("QR_CODE not in allowed formats, skipping");
            return Ok(None);
        }

        let start = std::time::Instant::now();
        let luma = frame.to_luma()?;

        let content = self.find(&luma, options.try_harder);

        trace!(
            width = frame.width,
            height = frame.height,
            elapsed_ms = start.elapsed().as_millis(),
            found = content.is_some(),
            "QR decode pass complete"
        );

        Ok(content.map(|text| ScanResult::new(text, BarcodeFormat::QrCode)))
    }

    fn name(&self) -> &'static str {
        "rqrr"
    }
}

/// Multi-format decoder backed by `rxing`, a port of ZXing
///
/// QR codes are tried first with `rqrr`. Everything else, and QR codes the
/// fast pass missed, go through ZXing's multi-format reader with the
/// `try_harder` and allowed-format hints.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZxingDecoder {
    qr: QrDecoder,
}

impl ZxingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn hints(options: &DecodeOptions) -> DecodingHintDictionary {
        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            DecodeHintType::TRY_HARDER,
            DecodeHintValue::TryHarder(options.try_harder),
        );
        if let Some(formats) = &options.formats {
            let possible: HashSet<rxing::BarcodeFormat> =
                formats.iter().copied().map(to_rxing_format).collect();
            hints.insert(
                DecodeHintType::POSSIBLE_FORMATS,
                DecodeHintValue::PossibleFormats(possible),
            );
        }
        hints
    }
}

impl BarcodeDecoder for ZxingDecoder {
    fn decode(
        &self,
        frame: &FrameBuffer,
        options: &DecodeOptions,
    ) -> Result<Option<ScanResult>, DecodeError> {
        let start = std::time::Instant::now();
        let luma = frame.to_luma()?;

        if options.accepts(BarcodeFormat::QrCode)
            && let Some(text) = self.qr.find(&luma, options.try_harder)
        {
            return Ok(Some(ScanResult::new(text, BarcodeFormat::QrCode)));
        }

        let (width, height) = luma.dimensions();
        let source = Luma8LuminanceSource::new(luma.into_raw(), width, height);
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));
        let mut reader = MultiFormatReader::default();

        let found = match reader.decode_with_hints(&mut bitmap, &Self::hints(options)) {
            Ok(result) => match from_rxing_format(result.getBarcodeFormat()) {
                Some(format) if options.accepts(format) => {
                    debug!(%format, "Decoded barcode");
                    Some(ScanResult::new(result.getText(), format))
                }
                _ => {
                    debug!(format = ?result.getBarcodeFormat(), "Ignoring barcode of unwanted format");
                    None
                }
            },
            // ZXing reports "nothing here" as an error
            Err(e) => {
                trace!(error = ?e, "No barcode in frame");
                None
            }
        };

        trace!(
            width,
            height,
            elapsed_ms = start.elapsed().as_millis(),
            found = found.is_some(),
            "ZXing decode pass complete"
        );
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "zxing"
    }
}

fn to_rxing_format(format: BarcodeFormat) -> rxing::BarcodeFormat {
    match format {
        BarcodeFormat::Aztec => rxing::BarcodeFormat::AZTEC,
        BarcodeFormat::Codabar => rxing::BarcodeFormat::CODABAR,
        BarcodeFormat::Code39 => rxing::BarcodeFormat::CODE_39,
        BarcodeFormat::Code93 => rxing::BarcodeFormat::CODE_93,
        BarcodeFormat::Code128 => rxing::BarcodeFormat::CODE_128,
        BarcodeFormat::DataMatrix => rxing::BarcodeFormat::DATA_MATRIX,
        BarcodeFormat::Ean8 => rxing::BarcodeFormat::EAN_8,
        BarcodeFormat::Ean13 => rxing::BarcodeFormat::EAN_13,
        BarcodeFormat::Itf => rxing::BarcodeFormat::ITF,
        BarcodeFormat::MaxiCode => rxing::BarcodeFormat::MAXICODE,
        BarcodeFormat::Pdf417 => rxing::BarcodeFormat::PDF_417,
        BarcodeFormat::QrCode => rxing::BarcodeFormat::QR_CODE,
        BarcodeFormat::Rss14 => rxing::BarcodeFormat::RSS_14,
        BarcodeFormat::RssExpanded => rxing::BarcodeFormat::RSS_EXPANDED,
        BarcodeFormat::UpcA => rxing::BarcodeFormat::UPC_A,
        BarcodeFormat::UpcE => rxing::BarcodeFormat::UPC_E,
        BarcodeFormat::UpcEanExtension => rxing::BarcodeFormat::UPC_EAN_EXTENSION,
    }
}

/// `None` for symbologies ZXing knows but callers cannot ask for
fn from_rxing_format(format: &rxing::BarcodeFormat) -> Option<BarcodeFormat> {
    BarcodeFormat::ALL
        .into_iter()
        .find(|ours| to_rxing_format(*ours) == *format)
}

/// Decode a barcode from a still image file
pub fn decode_image_file(
    decoder: &dyn BarcodeDecoder,
    path: &Path,
    options: &DecodeOptions,
) -> Result<Option<ScanResult>, ScanError> {
    info!(path = %path.display(), decoder = decoder.name(), "Decoding image file");

    let image = image::open(path).map_err(|e| {
        ScanError::DecodeLibrary(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    Ok(decoder.decode(&FrameBuffer::from_dynamic_image(&image), options)?)
}
