pub mod frame;
pub mod gst;

pub use frame::{AnnotatedFrame, FrameError, FrameMetadata, PixelFormat, RawFrame};
pub use gst::{FrameOutcome, GstSource, SourceDescriptor, SourceError, SourceEvent};
