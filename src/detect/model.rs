//! Trait seam for object-detection inference backends

use thiserror::Error;

use crate::source::RawFrame;

/// Axis-aligned box in pixel coordinates of the source frame.
///
/// Edges may land outside the frame; the overlay pass clamps while drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// One model-predicted object instance for a single frame
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f32,
}

/// Per-frame inference failures. Recoverable: the stage logs and skips the
/// frame, the stream continues.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("malformed model input: {0}")]
    MalformedInput(String),
    #[error("model produced no usable output")]
    EmptyResult,
}

/// An object-detection backend.
///
/// Implementations take ownership of whatever tensor conversion their runtime
/// needs; the pipeline hands them a length-checked RGB frame and expects pixel
/// coordinates back. One call per frame, synchronous, on the source's
/// streaming thread.
pub trait DetectionModel: Send {
    fn infer(&mut self, frame: &RawFrame) -> Result<Vec<Detection>, DetectionError>;
}

/// Placeholder backend used until a real detector is wired in. Reports no
/// detections, so frames pass through the stage unannotated.
#[derive(Debug, Default)]
pub struct NullModel;

impl DetectionModel for NullModel {
    fn infer(&mut self, _frame: &RawFrame) -> Result<Vec<Detection>, DetectionError> {
        Ok(Vec::new())
    }
}
