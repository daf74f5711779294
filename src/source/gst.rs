//! GStreamer-backed frame source for files and V4L2 cameras

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::source::frame::{FrameMetadata, PixelFormat, RawFrame};
use crate::utils;

/// Fatal source failures. Any of these ends the run with a non-zero exit.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("source not found: {0}")]
    NotFound(String),
    #[error("decode failure: {0}")]
    DecodeFailure(String),
    #[error("no frames arrived within {0:?}")]
    NoData(Duration),
}

/// Bus-level events forwarded to the display loop
#[derive(Debug, Clone)]
pub enum SourceEvent {
    EndOfStream,
    Failed(SourceError),
}

/// Returned by the frame callback to tell the source whether to keep pulling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Error,
}

/// Where frames come from: a video file or a camera index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    File(PathBuf),
    Device(u32),
}

impl SourceDescriptor {
    /// An all-digit argument is a camera index, anything else a file path
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<u32>() {
            Ok(index) => SourceDescriptor::Device(index),
            Err(_) => SourceDescriptor::File(PathBuf::from(raw)),
        }
    }

    /// Pre-flight check so a bad descriptor fails before any pipeline exists
    pub fn resolve(&self) -> Result<(), SourceError> {
        match self {
            SourceDescriptor::File(path) => {
                if path.is_file() {
                    Ok(())
                } else {
                    Err(SourceError::NotFound(path.display().to_string()))
                }
            }
            SourceDescriptor::Device(index) => utils::probe_device(*index).map(|_| ()),
        }
    }
}

/// Wraps a GStreamer decode pipeline and pushes each decoded frame into a
/// registered callback on the pipeline's streaming thread.
pub struct GstSource {
    pipeline: Option<gst::Pipeline>,
    appsink: Option<gst_app::AppSink>,
    frames: Arc<AtomicU64>,
    stop_flag: Arc<AtomicBool>,
    bus_thread: Option<JoinHandle<()>>,
    events_tx: flume::Sender<SourceEvent>,
    stopped: bool,
}

impl GstSource {
    /// Build the decode pipeline for `descriptor`. Both source kinds converge
    /// on raw RGB at the appsink, so downstream code never knows which path
    /// produced a frame.
    pub fn open(
        descriptor: &SourceDescriptor,
    ) -> Result<(Self, flume::Receiver<SourceEvent>), SourceError> {
        gst::init().map_err(|e| SourceError::DecodeFailure(format!("gstreamer init: {e}")))?;

        let pipeline_str = Self::build_pipeline_string(descriptor);
        info!("Pipeline: {}", pipeline_str);

        let pipeline = gst::parse::launch(&pipeline_str)
            .map_err(|e| SourceError::DecodeFailure(format!("pipeline construction: {e}")))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| SourceError::DecodeFailure("element is not a pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| SourceError::DecodeFailure("appsink element missing".into()))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| SourceError::DecodeFailure("sink element is not an appsink".into()))?;

        // The appsink keeps at most two buffers and drops stale ones; the
        // real hand-off buffering happens in the frame queue. sync=false so
        // delivery is not throttled to the stream clock.
        appsink.set_property("max-buffers", 2u32);
        appsink.set_property("drop", true);
        appsink.set_property("sync", false);

        let (events_tx, events_rx) = flume::unbounded();

        Ok((
            Self {
                pipeline: Some(pipeline),
                appsink: Some(appsink),
                frames: Arc::new(AtomicU64::new(0)),
                stop_flag: Arc::new(AtomicBool::new(false)),
                bus_thread: None,
                events_tx,
                stopped: false,
            },
            events_rx,
        ))
    }

    fn build_pipeline_string(descriptor: &SourceDescriptor) -> String {
        match descriptor {
            SourceDescriptor::Device(index) => format!(
                "v4l2src device={} ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink",
                utils::device_node(*index)
            ),
            SourceDescriptor::File(path) => format!(
                "filesrc location=\"{}\" ! decodebin ! videoconvert ! \
                 video/x-raw,format=RGB ! appsink name=sink",
                path.display()
            ),
        }
    }

    /// Register the per-frame callback. Fires synchronously on the streaming
    /// thread once per decoded frame; it must not block for long or upstream
    /// decode stalls. Samples that fail the payload invariant are logged and
    /// skipped rather than surfaced as stream errors.
    pub fn on_frame<F>(&mut self, callback: F)
    where
        F: FnMut(RawFrame) -> FrameOutcome + Send + 'static,
    {
        let appsink = self
            .appsink
            .as_ref()
            .expect("on_frame called after stop")
            .clone();
        let frames = self.frames.clone();
        let callback = Mutex::new(callback);

        let callbacks = gst_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                let frame = match Self::frame_from_sample(&sample, &frames) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(error = %err, "discarding malformed sample");
                        return Ok(gst::FlowSuccess::Ok);
                    }
                };
                match (*callback.lock().unwrap())(frame) {
                    FrameOutcome::Continue => Ok(gst::FlowSuccess::Ok),
                    FrameOutcome::Error => Err(gst::FlowError::Error),
                }
            })
            .build();

        appsink.set_callbacks(callbacks);
    }

    fn frame_from_sample(sample: &gst::Sample, frames: &AtomicU64) -> Result<RawFrame> {
        let buffer = sample
            .buffer()
            .ok_or_else(|| eyre!("sample contains no buffer"))?;
        let caps = sample.caps().ok_or_else(|| eyre!("sample has no caps"))?;
        let video_info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|_| eyre!("failed to parse video info from caps"))?;

        if video_info.format() != gst_video::VideoFormat::Rgb {
            return Err(eyre!("unexpected pixel format {:?}", video_info.format()));
        }

        let map = buffer
            .map_readable()
            .map_err(|_| eyre!("failed to map buffer"))?;
        let data = Bytes::copy_from_slice(map.as_slice());

        let sequence = frames.fetch_add(1, Ordering::Relaxed) + 1;
        let meta = FrameMetadata::new(
            sequence,
            video_info.width(),
            video_info.height(),
            PixelFormat::Rgb24,
        );

        RawFrame::new(data, meta).map_err(Into::into)
    }

    /// Start decoding. Also spawns the bus watch that turns EOS and decode
    /// errors into events for the display loop.
    pub fn start(&mut self) -> Result<(), SourceError> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| SourceError::DecodeFailure("source already stopped".into()))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| SourceError::DecodeFailure(format!("failed to start pipeline: {e:?}")))?;

        let (state_change, _, _) = pipeline.state(Some(gst::ClockTime::from_seconds(5)));
        match state_change {
            Ok(gst::StateChangeSuccess::Success) => info!("pipeline started"),
            Ok(gst::StateChangeSuccess::Async) => info!("pipeline starting asynchronously"),
            Ok(gst::StateChangeSuccess::NoPreroll) => info!("pipeline started (live source)"),
            Err(_) => {
                return Err(SourceError::DecodeFailure(
                    "pipeline refused to start".into(),
                ))
            }
        }

        let bus = pipeline
            .bus()
            .ok_or_else(|| SourceError::DecodeFailure("pipeline has no bus".into()))?;
        let stop_flag = self.stop_flag.clone();
        let events_tx = self.events_tx.clone();

        self.bus_thread = Some(std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(100)) else {
                    continue;
                };
                match msg.view() {
                    gst::MessageView::Eos(_) => {
                        debug!("end of stream");
                        let _ = events_tx.send(SourceEvent::EndOfStream);
                        break;
                    }
                    gst::MessageView::Error(err) => {
                        let _ = events_tx.send(SourceEvent::Failed(SourceError::DecodeFailure(
                            err.error().to_string(),
                        )));
                        break;
                    }
                    _ => {}
                }
            }
        }));

        Ok(())
    }

    /// Frames delivered to the callback so far
    pub fn frames_delivered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Tear the pipeline down and release device/decoder resources.
    /// Idempotent, and safe to call while a callback is in flight: the
    /// callback finishes and its pushed frame is simply never displayed.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.stop_flag.store(true, Ordering::Relaxed);

        if let Some(pipeline) = self.pipeline.take() {
            if let Err(err) = pipeline.set_state(gst::State::Null) {
                warn!(error = ?err, "failed to reach null state during stop");
            }
        }
        self.appsink = None;

        if let Some(handle) = self.bus_thread.take() {
            let _ = handle.join();
        }
        info!("source stopped");
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (events_tx, _events_rx) = flume::unbounded();
        Self {
            pipeline: None,
            appsink: None,
            frames: Arc::new(AtomicU64::new(0)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            bus_thread: None,
            events_tx,
            stopped: false,
        }
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        self.stop();
    }
}
