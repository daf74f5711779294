pub mod window;

pub use window::{ExitReason, Sdl2Display};
