//! pf-dmd: Dot-matrix display for Playfield
//!
//! Every active mode may own one [`Layer`]. Each tick the engine walks the
//! mode stack top-down and hands the captured frames to the [`Compositor`],
//! which merges them into the frame sent to the [`DisplaySink`].
//!
//! ```text
//! ┌─────────────┐   next_frame()   ┌─────────────┐
//! │ Layer (top) │ ───────────────▶ │             │
//! ├─────────────┤                  │ Compositor  │ ──▶ Frame ──▶ DisplaySink
//! │ Layer       │ ───────────────▶ │ (top-most   │
//! ├─────────────┤                  │  opaque     │
//! │ Layer (opq) │ ───────────────▶ │  wins)      │
//! └─────────────┘                  └─────────────┘
//! ```

mod compositor;
mod font;
mod frame;
mod layer;
mod transition;

pub use compositor::*;
pub use font::*;
pub use frame::*;
pub use layer::*;
pub use transition::*;

/// Highest dot brightness
pub const MAX_DOT: u8 = 15;

/// Receives one composed frame per tick
pub trait DisplaySink {
    fn present(&mut self, frame: &Frame);
}

/// Keeps only the last presented frame
#[derive(Debug, Clone, Default)]
pub struct LastFrameSink {
    pub last: Option<Frame>,
    pub presented: u64,
}

impl DisplaySink for LastFrameSink {
    fn present(&mut self, frame: &Frame) {
        self.presented += 1;
        self.last = Some(frame.clone());
    }
}
