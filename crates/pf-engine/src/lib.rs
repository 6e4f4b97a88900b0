//! pf-engine: Playfield rules engine
//!
//! Runs a stack of prioritised modes against switch input and a frame clock:
//! - Mode stack with priority-ordered dispatch and deferred self-removal
//! - Per-mode handler tables built once at registration
//! - Named delayed callbacks with replace/cancel semantics
//! - Held-switch events (`sw_<name>_active_for_<N>ms`)
//! - Game, player and typed per-player state
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Machine                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  on_switch_event() ─▶ SwitchBank ─▶ SwitchRouter (hold checks)   │
//! │           │                                   │                  │
//! │           ▼                                   ▼                  │
//! │   ┌──────────────────────┐  tick(now)  ┌──────────────┐          │
//! │   │ ModeStack (top-down) │ ◀────────── │ due checks + │          │
//! │   │  prio 50  Slot<M>    │             │ DelayQueues  │          │
//! │   │  prio 20  Slot<M>    │             └──────────────┘          │
//! │   │  prio  1  Slot<M>    │ ──layers──▶ Compositor ─▶ DisplaySink │
//! │   └──────────────────────┘                                       │
//! │   ModeCx: outputs, game, player state, services, delays          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pf_engine::{Machine, Mode, ModeSettings, HandlerTable, ModeCx, Event, HandlerResult, Flow};
//!
//! struct Kickback;
//!
//! impl Mode for Kickback {
//!     fn handlers(&self) -> HandlerTable<Self> {
//!         HandlerTable::new().on("sw_outlaneL_active", Self::fire)
//!     }
//! }
//!
//! impl Kickback {
//!     fn fire(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
//!         cx.outputs().pulse_default("kickback");
//!         Ok(Flow::Stop)
//!     }
//! }
//!
//! let id = machine.register(ModeSettings::new("kickback", 30), Kickback)?;
//! machine.add_mode(id)?;
//! machine.on_switch_event("outlaneL", SwitchState::Active, Timestamp(1_000))?;
//! machine.tick(Timestamp(1_016));
//! ```

mod context;
mod game;
mod handler;
mod machine;
mod mode;
mod outputs;
mod router;
mod runtime;
mod services;
mod stack;
mod timer;

pub use context::*;
pub use game::*;
pub use handler::*;
pub use machine::*;
pub use mode::{Lifecycle, Mode, ModeId, ModeSettings, SwitchBlocking, Wiring};
pub use outputs::*;
pub use router::*;
pub use services::*;
pub use timer::*;

/// Events the engine itself sends
pub mod events {
    pub const GAME_STARTED: &str = "evt_game_started";
    pub const PLAYER_ADDED: &str = "evt_player_added";
    pub const BALL_STARTING: &str = "evt_ball_starting";
    pub const BALL_ENDING: &str = "evt_ball_ending";
    pub const GAME_ENDED: &str = "evt_game_ended";
}
