//! Bounded hand-off queue between detection and display

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::source::AnnotatedFrame;

/// Counters shared by both halves of the queue
#[derive(Default)]
struct QueueStats {
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of the queue counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub pushed: u64,
    pub popped: u64,
    pub dropped: u64,
}

impl QueueStats {
    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Create a bounded FIFO of annotated frames with fixed `capacity`.
///
/// The producer half lives on the source's streaming thread, the consumer half
/// on the display thread. Neither operation ever blocks: a push against a full
/// queue discards the incoming frame, keeping the capture path live at the cost
/// of an occasional gap in the displayed stream.
pub fn frame_queue(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let (prod, cons) = HeapRb::new(capacity).split();
    let stats = Arc::new(CachePadded::new(QueueStats::default()));
    (
        FrameProducer {
            inner: prod,
            stats: stats.clone(),
        },
        FrameConsumer {
            inner: cons,
            stats,
        },
    )
}

/// Producer half, owned by the detection stage
pub struct FrameProducer {
    inner: HeapProd<AnnotatedFrame>,
    stats: Arc<CachePadded<QueueStats>>,
}

impl FrameProducer {
    /// Non-blocking push. Returns false when the queue is full; the frame is
    /// dropped and counted, never queued late.
    pub fn try_push(&mut self, frame: AnnotatedFrame) -> bool {
        match self.inner.try_push(frame) {
            Ok(()) => {
                self.stats.pushed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("argus_frames_dropped").increment(1);
                false
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    pub fn stats(&self) -> QueueSnapshot {
        self.stats.snapshot()
    }
}

/// Consumer half, owned by the display loop
pub struct FrameConsumer {
    inner: HeapCons<AnnotatedFrame>,
    stats: Arc<CachePadded<QueueStats>>,
}

impl FrameConsumer {
    /// Non-blocking pop; callers back off on None instead of spinning
    pub fn try_pop(&mut self) -> Option<AnnotatedFrame> {
        let frame = self.inner.try_pop()?;
        self.stats.popped.fetch_add(1, Ordering::Relaxed);
        Some(frame)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    pub fn stats(&self) -> QueueSnapshot {
        self.stats.snapshot()
    }
}
