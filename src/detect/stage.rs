//! Detection stage: raw frame in, annotated frame into the queue

use tracing::{debug, warn};

use crate::detect::model::{Detection, DetectionError, DetectionModel};
use crate::detect::overlay;
use crate::pipeline::FrameProducer;
use crate::source::{AnnotatedFrame, FrameOutcome, RawFrame};
use crate::DetectionConfig;

/// Runs inference on every frame the source delivers and pushes the annotated
/// result toward the display.
///
/// Owned by the source callback, so everything here executes on the streaming
/// thread and must stay non-blocking: inference is one synchronous call, the
/// enqueue is a try_push.
pub struct DetectionStage {
    model: Box<dyn DetectionModel>,
    producer: FrameProducer,
    config: DetectionConfig,
}

impl DetectionStage {
    pub fn new(
        model: Box<dyn DetectionModel>,
        producer: FrameProducer,
        config: DetectionConfig,
    ) -> Self {
        Self {
            model,
            producer,
            config,
        }
    }

    /// Run the model once and composite surviving detections onto a copy of
    /// the frame. Dimensions never change; zero detections yield a clean copy.
    pub fn process(&mut self, frame: &RawFrame) -> Result<AnnotatedFrame, DetectionError> {
        let detections = self.model.infer(frame)?;
        let kept: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.confidence >= self.config.confidence_threshold)
            .collect();

        if !kept.is_empty() {
            debug!(
                sequence = frame.meta.sequence,
                detections = kept.len(),
                "annotating frame"
            );
        }

        overlay::render(frame, &kept)
    }

    /// Callback entry point for the source. Per-frame failures are logged and
    /// skipped; a full queue drops the frame. Neither ever stalls capture.
    pub fn handle(&mut self, frame: RawFrame) -> FrameOutcome {
        match self.process(&frame) {
            Ok(annotated) => {
                if !self.producer.try_push(annotated) {
                    debug!(sequence = frame.meta.sequence, "queue full, frame dropped");
                }
            }
            Err(err) => {
                warn!(sequence = frame.meta.sequence, error = %err, "skipping frame");
            }
        }
        FrameOutcome::Continue
    }

    /// Counters of the queue this stage feeds
    pub fn queue_stats(&self) -> crate::pipeline::QueueSnapshot {
        self.producer.stats()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::detect::model::BoundingBox;
    use crate::pipeline::frame_queue;
    use crate::source::{FrameMetadata, PixelFormat};

    struct OneBoxModel;

    impl DetectionModel for OneBoxModel {
        fn infer(&mut self, _frame: &RawFrame) -> Result<Vec<Detection>, DetectionError> {
            Ok(vec![Detection {
                bbox: BoundingBox {
                    left: 10.0,
                    top: 20.0,
                    right: 50.0,
                    bottom: 60.0,
                },
                label: "person".into(),
                confidence: 0.8,
            }])
        }
    }

    struct FailingModel;

    impl DetectionModel for FailingModel {
        fn infer(&mut self, _frame: &RawFrame) -> Result<Vec<Detection>, DetectionError> {
            Err(DetectionError::EmptyResult)
        }
    }

    struct LowConfidenceModel;

    impl DetectionModel for LowConfidenceModel {
        fn infer(&mut self, _frame: &RawFrame) -> Result<Vec<Detection>, DetectionError> {
            Ok(vec![Detection {
                bbox: BoundingBox {
                    left: 1.0,
                    top: 1.0,
                    right: 5.0,
                    bottom: 5.0,
                },
                label: "noise".into(),
                confidence: 0.05,
            }])
        }
    }

    fn zero_frame(sequence: u64) -> RawFrame {
        let meta = FrameMetadata::new(sequence, 320, 240, PixelFormat::Rgb24);
        RawFrame::new(Bytes::from(vec![0u8; meta.expected_len()]), meta).unwrap()
    }

    fn stage(model: Box<dyn DetectionModel>, capacity: usize) -> (DetectionStage, crate::pipeline::FrameConsumer) {
        let (producer, consumer) = frame_queue(capacity);
        (
            DetectionStage::new(model, producer, DetectionConfig::default()),
            consumer,
        )
    }

    #[test]
    fn zero_detections_return_clean_copy() {
        let (mut stage, _cons) = stage(Box::new(crate::detect::model::NullModel), 4);
        let frame = zero_frame(1);
        let annotated = stage.process(&frame).unwrap();
        assert_eq!(annotated.width(), 320);
        assert_eq!(annotated.height(), 240);
        assert_eq!(annotated.data, frame.data);
    }

    #[test]
    fn annotated_frame_keeps_dimensions() {
        let (mut stage, _cons) = stage(Box::new(OneBoxModel), 4);
        let annotated = stage.process(&zero_frame(1)).unwrap();
        assert_eq!(annotated.data.len(), 320 * 240 * 3);
        assert_ne!(annotated.data, zero_frame(1).data); // overlay present
    }

    #[test]
    fn inference_failure_is_swallowed() {
        let (mut stage, mut cons) = stage(Box::new(FailingModel), 4);
        assert!(matches!(
            stage.handle(zero_frame(1)),
            FrameOutcome::Continue
        ));
        assert!(cons.try_pop().is_none());
        assert_eq!(stage.queue_stats().pushed, 0);
    }

    #[test]
    fn below_threshold_detections_are_not_drawn() {
        let (mut stage, _cons) = stage(Box::new(LowConfidenceModel), 4);
        let frame = zero_frame(1);
        let annotated = stage.process(&frame).unwrap();
        assert_eq!(annotated.data, frame.data);
    }

    #[test]
    fn handle_pushes_exactly_one_frame_per_input() {
        let (mut stage, mut cons) = stage(Box::new(OneBoxModel), 4);
        for seq in 0..3 {
            stage.handle(zero_frame(seq));
        }
        for seq in 0..3 {
            assert_eq!(cons.try_pop().unwrap().meta.sequence, seq);
        }
        assert!(cons.is_empty());
    }
}
