//! Pipeline startup and scoped teardown

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::detect::DetectionStage;
use crate::source::{GstSource, SourceDescriptor, SourceError, SourceEvent};

/// Top-level pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Running,
    Error,
}

/// A started pipeline. Dropping it tears the source down, so teardown runs on
/// every exit path whether the run ended in a quit, an interrupt, or an error.
pub struct RunningPipeline {
    source: GstSource,
    events: flume::Receiver<SourceEvent>,
    state: PipelineState,
}

/// Resolve the descriptor, open and start the source, and wire the detection
/// stage in as its frame callback.
///
/// The returned pipeline has delivered at least one frame: sources that stay
/// silent through the grace period are torn down and reported as `NoData`.
pub fn startup(
    descriptor: &SourceDescriptor,
    stage: DetectionStage,
    grace: Duration,
) -> Result<RunningPipeline, SourceError> {
    descriptor.resolve()?;

    let (mut source, events) = GstSource::open(descriptor)?;
    let mut stage = stage;
    source.on_frame(move |frame| stage.handle(frame));
    source.start()?;

    let deadline = Instant::now() + grace;
    while source.frames_delivered() == 0 {
        match events.try_recv() {
            Ok(SourceEvent::Failed(err)) => {
                warn!(error = %err, "source failed before first frame");
                source.stop();
                return Err(err);
            }
            Ok(SourceEvent::EndOfStream) => {
                // Stream ended without ever producing a frame
                source.stop();
                return Err(SourceError::NoData(grace));
            }
            Err(_) => {}
        }
        if Instant::now() >= deadline {
            source.stop();
            return Err(SourceError::NoData(grace));
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    info!("pipeline running");
    Ok(RunningPipeline {
        source,
        events,
        state: PipelineState::Running,
    })
}

impl RunningPipeline {
    /// Bus events for the display loop
    pub fn events(&self) -> flume::Receiver<SourceEvent> {
        self.events.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Stop the source and release its resources. Idempotent; safe to call
    /// concurrently with an in-flight frame callback.
    pub fn shutdown(&mut self) {
        if self.state == PipelineState::Running {
            self.state = PipelineState::Stopped;
        }
        self.source.stop();
    }

    /// Teardown for a run that ended in a source error
    pub fn fail(&mut self) {
        self.state = PipelineState::Error;
        self.source.stop();
    }
}

impl Drop for RunningPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
