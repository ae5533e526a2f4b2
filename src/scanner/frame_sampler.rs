// SPDX-License-Identifier: GPL-3.0-only

//! Frame sampling
//!
//! Copies the frame the preview is currently showing into a tightly packed
//! [`FrameBuffer`]. Large frames are downscaled with bilinear filtering
//! before decoding; barcodes are usually large enough to survive it.

use crate::backends::camera::{CameraFrame, PixelFormat, PreviewStream};
use crate::errors::{DecodeError, ScanError};
use image::{DynamicImage, GrayImage};
use tracing::{trace, warn};

/// Pixel snapshot handed to the decoder
///
/// Rows are tightly packed (`width * bytes_per_pixel` bytes, no padding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Snapshot of a decoded still image
    pub fn from_dynamic_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, PixelFormat::RGBA, rgba.into_raw())
    }

    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Convert to an 8-bit luma image (BT.601 weights)
    pub fn to_luma(&self) -> Result<GrayImage, DecodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(DecodeError::new("Empty frame"));
        }
        if self.data.len() != self.expected_len() {
            return Err(DecodeError::new(format!(
                "Frame buffer is {} bytes, expected {} for {}x{} {:?}",
                self.data.len(),
                self.expected_len(),
                self.width,
                self.height,
                self.format
            )));
        }

        let luma: Vec<u8> = match self.format {
            PixelFormat::Gray8 => self.data.clone(),
            PixelFormat::RGBA => self.data.chunks_exact(4).map(|p| luma(p[0], p[1], p[2])).collect(),
            PixelFormat::BGRA => self.data.chunks_exact(4).map(|p| luma(p[2], p[1], p[0])).collect(),
            PixelFormat::RGB24 => self.data.chunks_exact(3).map(|p| luma(p[0], p[1], p[2])).collect(),
        };

        GrayImage::from_raw(self.width, self.height, luma)
            .ok_or_else(|| DecodeError::new("Luma buffer does not match frame dimensions"))
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

/// Captures preview frames into pixel buffers
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    /// Frames are downscaled so neither side exceeds this
    max_dimension: u32,
}

impl FrameSampler {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Copy the currently displayed frame
    ///
    /// `Ok(None)` means the preview is running but has no usable frame yet.
    /// Sampling a preview that is not playing is an error.
    pub fn sample_frame(&self, preview: &dyn PreviewStream) -> Result<Option<FrameBuffer>, ScanError> {
        if !preview.is_playing() {
            return Err(ScanError::NotPreviewing);
        }
        let Some(frame) = preview.current_frame() else {
            trace!("No preview frame rendered yet");
            return Ok(None);
        };
        Ok(self.capture(&frame))
    }

    /// Copy `frame` into a packed buffer, downscaling if it is too large
    ///
    /// Empty frames and frames whose data is shorter than their geometry
    /// are dropped.
    pub fn capture(&self, frame: &CameraFrame) -> Option<FrameBuffer> {
        let start = std::time::Instant::now();
        let (width, height) = (frame.width, frame.height);

        if width == 0 || height == 0 {
            warn!(width, height, "Dropping empty preview frame");
            return None;
        }
        let required = required_len(frame);
        if frame.data.len() < required {
            warn!(
                width,
                height,
                stride = frame.stride,
                format = ?frame.format,
                len = frame.data.len(),
                required,
                "Dropping truncated preview frame"
            );
            return None;
        }

        let buffer = if width > self.max_dimension || height > self.max_dimension {
            let scale = (width as f32 / self.max_dimension as f32)
                .max(height as f32 / self.max_dimension as f32);
            let new_width = ((width as f32 / scale) as u32).max(1);
            let new_height = ((height as f32 / scale) as u32).max(1);
            FrameBuffer::new(
                new_width,
                new_height,
                frame.format,
                downscale(frame, new_width, new_height),
            )
        } else {
            FrameBuffer::new(width, height, frame.format, copy_without_stride(frame))
        };

        trace!(
            src_width = width,
            src_height = height,
            width = buffer.width,
            height = buffer.height,
            elapsed_us = start.elapsed().as_micros(),
            "Sampled preview frame"
        );
        Some(buffer)
    }
}

fn row_stride(frame: &CameraFrame) -> (usize, usize) {
    let row_len = frame.width as usize * frame.format.bytes_per_pixel();
    (row_len, (frame.stride as usize).max(row_len))
}

/// Bytes needed for every row; the last one may lack its padding
fn required_len(frame: &CameraFrame) -> usize {
    let (row_len, stride) = row_stride(frame);
    match frame.height as usize {
        0 => 0,
        height => (height - 1) * stride + row_len,
    }
}

/// Copy frame data without stride padding
fn copy_without_stride(frame: &CameraFrame) -> Vec<u8> {
    let (row_len, stride) = row_stride(frame);
    let height = frame.height as usize;

    let mut result = Vec::with_capacity(row_len * height);
    for row in frame.data.chunks(stride).take(height) {
        result.extend_from_slice(&row[..row_len.min(row.len())]);
    }
    result
}

/// Downscale a frame using bilinear interpolation
fn downscale(frame: &CameraFrame, dst_width: u32, dst_height: u32) -> Vec<u8> {
    let bpp = frame.format.bytes_per_pixel();
    let src_width = frame.width as usize;
    let src_height = frame.height as usize;
    let stride = (frame.stride as usize).max(src_width * bpp);

    let mut result = Vec::with_capacity(dst_width as usize * dst_height as usize * bpp);

    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;

    let sample = |px: usize, py: usize, channel: usize| -> f32 {
        let offset = py * stride + px * bpp + channel;
        frame.data.get(offset).copied().unwrap_or(0) as f32
    };

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = src_x as usize;
            let y0 = src_y as usize;
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            for channel in 0..bpp {
                let value = sample(x0, y0, channel) * (1.0 - x_frac) * (1.0 - y_frac)
                    + sample(x1, y0, channel) * x_frac * (1.0 - y_frac)
                    + sample(x0, y1, channel) * (1.0 - x_frac) * y_frac
                    + sample(x1, y1, channel) * x_frac * y_frac;
                result.push(value as u8);
            }
        }
    }

    result
}
