//! SDL2 window display and the top-level run/quit state machine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use tracing::{info, warn};

use crate::pipeline::FrameConsumer;
use crate::source::{AnnotatedFrame, SourceError, SourceEvent};

/// Why the display loop ended
#[derive(Debug)]
pub enum ExitReason {
    UserQuit,
    Interrupted,
    StreamEnded,
    SourceFailed(SourceError),
}

enum LoopState {
    Polling,
    Rendering(AnnotatedFrame),
    Quitting(ExitReason),
}

/// SDL2 window display.
/// Owns window creation, the event loop, and frame rendering; frames are
/// scaled to the fixed window resolution on present.
pub struct Sdl2Display {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
}

impl Sdl2Display {
    pub fn new(sdl_context: &sdl2::Sdl, width: u32, height: u32) -> Result<Self> {
        let video_subsystem = sdl_context.video().map_err(|e| eyre!(e))?;

        let window = video_subsystem
            .window("Argus Detection Pipeline", width, height)
            .position_centered()
            .build()?;

        let canvas = window.into_canvas().present_vsync().build()?;
        let texture_creator = canvas.texture_creator();

        Ok(Self {
            canvas,
            texture_creator,
        })
    }

    pub fn render_frame(&mut self, frame: &AnnotatedFrame) -> Result<()> {
        let mut texture = self
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, frame.width(), frame.height())
            .map_err(|e| eyre!(e))?;

        texture
            .update(None, &frame.data, frame.meta.stride as usize)
            .map_err(|e| eyre!(e))?;

        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(|e| eyre!(e))?;

        self.canvas.present();
        metrics::counter!("argus_frames_rendered").increment(1);
        Ok(())
    }

    /// Drain the frame queue until something ends the run: a `q` keypress or
    /// window close, an interrupt, end of stream, or a source failure.
    ///
    /// Polling never blocks the producer side; an empty queue is a short sleep,
    /// not a wait on the source.
    pub fn run(
        &mut self,
        sdl_context: &sdl2::Sdl,
        frames: &mut FrameConsumer,
        events: flume::Receiver<SourceEvent>,
        interrupted: Arc<AtomicBool>,
    ) -> Result<ExitReason> {
        let mut event_pump = sdl_context.event_pump().map_err(|e| eyre!(e))?;
        let mut state = LoopState::Polling;
        let mut stream_ended = false;

        loop {
            // Quit signals apply from any state, first one wins
            if !matches!(state, LoopState::Quitting(_)) {
                if interrupted.load(Ordering::Relaxed) {
                    info!("interrupt received");
                    state = LoopState::Quitting(ExitReason::Interrupted);
                }

                for event in event_pump.poll_iter() {
                    match event {
                        Event::Quit { .. }
                        | Event::KeyDown {
                            keycode: Some(Keycode::Q),
                            ..
                        } => {
                            info!("quit requested");
                            state = LoopState::Quitting(ExitReason::UserQuit);
                            break;
                        }
                        _ => {}
                    }
                }
            }

            if !matches!(state, LoopState::Quitting(_)) {
                match events.try_recv() {
                    Ok(SourceEvent::Failed(err)) => {
                        warn!(error = %err, "source failed");
                        state = LoopState::Quitting(ExitReason::SourceFailed(err));
                    }
                    Ok(SourceEvent::EndOfStream) => stream_ended = true,
                    Err(_) => {}
                }
            }

            state = match state {
                LoopState::Polling => match frames.try_pop() {
                    Some(frame) => LoopState::Rendering(frame),
                    // Stream over and queue drained: nothing left to show
                    None if stream_ended => LoopState::Quitting(ExitReason::StreamEnded),
                    None => {
                        let interval = crate::CONFIG.load().display.poll_interval_ms;
                        std::thread::sleep(Duration::from_millis(interval));
                        LoopState::Polling
                    }
                },
                LoopState::Rendering(frame) => {
                    self.render_frame(&frame)?;
                    LoopState::Polling
                }
                LoopState::Quitting(reason) => {
                    info!(?reason, "display loop ending");
                    return Ok(reason);
                }
            };
        }
    }
}
