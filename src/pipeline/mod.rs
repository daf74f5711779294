pub mod lifecycle;
pub mod queue;

pub use lifecycle::{startup, PipelineState, RunningPipeline};
pub use queue::{frame_queue, FrameConsumer, FrameProducer, QueueSnapshot};
