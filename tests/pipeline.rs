//! End-to-end pipeline scenarios over synthetic frame streams

use bytes::Bytes;

use argus::detect::{BoundingBox, Detection, DetectionError, DetectionModel, DetectionStage};
use argus::pipeline::frame_queue;
use argus::source::{FrameMetadata, PixelFormat, RawFrame};
use argus::DetectionConfig;

/// Stub backend reporting one fixed box per frame
struct OneBoxModel;

impl DetectionModel for OneBoxModel {
    fn infer(&mut self, _frame: &RawFrame) -> Result<Vec<Detection>, DetectionError> {
        Ok(vec![Detection {
            bbox: BoundingBox {
                left: 40.0,
                top: 40.0,
                right: 120.0,
                bottom: 160.0,
            },
            label: "person".into(),
            confidence: 0.9,
        }])
    }
}

/// Stub backend that fails on every even-numbered frame
struct FlakyModel;

impl DetectionModel for FlakyModel {
    fn infer(&mut self, frame: &RawFrame) -> Result<Vec<Detection>, DetectionError> {
        if frame.meta.sequence % 2 == 0 {
            Err(DetectionError::EmptyResult)
        } else {
            Ok(Vec::new())
        }
    }
}

fn synthetic_stream(count: u64) -> Vec<RawFrame> {
    (1..=count)
        .map(|seq| {
            let meta = FrameMetadata::new(seq, 320, 240, PixelFormat::Rgb24);
            RawFrame::new(Bytes::from(vec![0u8; meta.expected_len()]), meta).unwrap()
        })
        .collect()
}

#[test]
fn five_frames_flow_through_a_capacity_ten_queue_in_order() {
    let (producer, mut consumer) = frame_queue(10);
    let mut stage = DetectionStage::new(Box::new(OneBoxModel), producer, DetectionConfig::default());

    for frame in synthetic_stream(5) {
        stage.handle(frame);
    }

    let stats = stage.queue_stats();
    assert_eq!(stats.pushed, 5);
    assert_eq!(stats.dropped, 0);

    let mut sequences = Vec::new();
    while let Some(frame) = consumer.try_pop() {
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
        assert_eq!(frame.data.len(), 320 * 240 * 3);
        sequences.push(frame.meta.sequence);
    }
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[test]
fn stalled_consumer_with_capacity_two_drops_exactly_three() {
    let (producer, consumer) = frame_queue(2);
    let mut stage = DetectionStage::new(Box::new(OneBoxModel), producer, DetectionConfig::default());

    for frame in synthetic_stream(5) {
        stage.handle(frame);
    }

    assert_eq!(consumer.len(), 2);
    let stats = consumer.stats();
    assert_eq!(stats.pushed, 2);
    assert_eq!(stats.dropped, 3);
}

#[test]
fn per_frame_failures_skip_without_breaking_the_stream() {
    let (producer, mut consumer) = frame_queue(10);
    let mut stage = DetectionStage::new(Box::new(FlakyModel), producer, DetectionConfig::default());

    for frame in synthetic_stream(5) {
        stage.handle(frame);
    }

    // Frames 2 and 4 failed inference and were skipped; the rest arrive in order
    let mut sequences = Vec::new();
    while let Some(frame) = consumer.try_pop() {
        sequences.push(frame.meta.sequence);
    }
    assert_eq!(sequences, vec![1, 3, 5]);
    assert_eq!(stage.queue_stats().pushed, 3);
}

#[test]
fn annotated_payload_carries_the_overlay() {
    let (producer, mut consumer) = frame_queue(4);
    let mut stage = DetectionStage::new(Box::new(OneBoxModel), producer, DetectionConfig::default());

    for frame in synthetic_stream(1) {
        stage.handle(frame);
    }

    let annotated = consumer.try_pop().unwrap();
    assert!(annotated.data.iter().any(|&b| b != 0));
}
