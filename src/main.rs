//! Argus video pipeline: GStreamer decode, object detection, SDL2 display

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::info;

use argus::detect::{DetectionStage, NullModel};
use argus::display::{ExitReason, Sdl2Display};
use argus::pipeline::{self, frame_queue};
use argus::source::SourceDescriptor;
use argus::Config;

#[derive(Parser, Debug)]
#[command(name = "argus", about = "Real-time object detection over a video stream")]
struct Args {
    /// Path to a video file, or a camera index such as 0
    #[arg(long)]
    source: Option<String>,
}

fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("argus=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Argus launching...");

    let args = Args::parse();

    // Load configuration
    let config = Config::load().map_err(|e| eyre!("configuration error: {e}"))?;
    argus::CONFIG.store(Arc::new(config.clone()));

    let raw_source = args
        .source
        .unwrap_or_else(|| config.source.default_source.clone());
    let descriptor = SourceDescriptor::parse(&raw_source);
    info!("Using source: {:?}", descriptor);

    // Wire detection into the bounded hand-off queue
    let (producer, mut consumer) = frame_queue(config.pipeline.queue_capacity);
    let stage = DetectionStage::new(Box::new(NullModel), producer, config.detection.clone());

    // Fatal source errors surface here, before any window exists
    let mut running = pipeline::startup(
        &descriptor,
        stage,
        Duration::from_millis(config.source.startup_grace_ms),
    )?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;

    // Initialize SDL2 and run the display loop
    let sdl_context = sdl2::init().map_err(|e| eyre!(e))?;
    let mut display = Sdl2Display::new(&sdl_context, config.display.width, config.display.height)?;

    let reason = display.run(&sdl_context, &mut consumer, running.events(), interrupted)?;

    let stats = consumer.stats();
    info!(
        pushed = stats.pushed,
        popped = stats.popped,
        dropped = stats.dropped,
        "run summary"
    );

    match reason {
        ExitReason::SourceFailed(err) => {
            running.fail();
            Err(eyre!(err))
        }
        reason => {
            running.shutdown();
            info!(?reason, "Argus shutting down");
            Ok(())
        }
    }
}
