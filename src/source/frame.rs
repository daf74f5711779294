use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use thiserror::Error;

/// Pixel layout of decoded frames.
///
/// Both source paths converge on 3-byte interleaved RGB via videoconvert, so
/// everything downstream of the appsink is source-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
        }
    }
}

/// Frame metadata, shared between the raw frame and its annotated copy
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

impl FrameMetadata {
    pub fn new(sequence: u64, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            sequence,
            width,
            height,
            stride: width * format.bytes_per_pixel() as u32,
            format,
        }
    }

    /// Payload size the metadata promises
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: payload is {actual} bytes, expected {expected} for {width}x{height}")]
    PayloadSizeMismatch {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
}

/// One decoded, uncompressed frame as delivered by the source.
///
/// The payload is immutable and length-checked at construction, so consumers
/// can index into it by (x, y) without bounds surprises.
#[derive(Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub meta: Arc<FrameMetadata>,
    pub captured_at: Instant,
}

impl RawFrame {
    pub fn new(data: Bytes, meta: FrameMetadata) -> Result<Self, FrameError> {
        let expected = meta.expected_len();
        if data.len() != expected {
            return Err(FrameError::PayloadSizeMismatch {
                expected,
                actual: data.len(),
                width: meta.width,
                height: meta.height,
            });
        }
        Ok(Self {
            data,
            meta: Arc::new(meta),
            captured_at: Instant::now(),
        })
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }
}

/// A frame with detection overlays burned into its pixels.
///
/// Produced exactly once per successfully processed raw frame and moved, never
/// cloned, through queue and display.
pub struct AnnotatedFrame {
    pub data: Bytes,
    pub meta: Arc<FrameMetadata>,
    pub captured_at: Instant,
}

impl AnnotatedFrame {
    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }
}
