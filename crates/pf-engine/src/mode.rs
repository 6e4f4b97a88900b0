//! Modes
//!
//! A mode is any type implementing [`Mode`]. At registration the machine
//! wraps it in a [`Slot`] that composes the mode value with the components
//! every mode may need: its handler table, its delayed callbacks, an
//! optional scoring hook and a switch-blocking policy. The stack only sees
//! the type-erased [`ModeObject`] interface.

use std::any::Any;

use pf_core::{PfResult, Timestamp};
use pf_dmd::Layer;
use serde::{Deserialize, Serialize};

use crate::runtime::Runtime;
use crate::{DelayQueue, Event, Flow, HandlerResult, HandlerTable, ModeCx};

/// Handle to a registered mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModeId(pub(crate) usize);

impl ModeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ModeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// When the machine adds and removes a mode on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Only explicit add/remove
    #[default]
    Manual,
    /// Added at reset, never removed by game flow
    System,
    /// Active whenever no game is in progress
    Attract,
    /// Added at game start, removed at game end
    Game,
    /// Added at ball start, removed at ball end
    Ball,
}

/// How a mode shields lower modes from switch events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchBlocking {
    /// Handlers decide
    #[default]
    None,
    /// Any switch event this mode handles stops there
    Handled,
    /// Every switch event stops at this mode
    All,
}

/// Per-instance configuration of a registered mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSettings {
    pub name: String,
    /// Higher dispatches first and draws on top
    pub priority: i32,
    pub lifecycle: Lifecycle,
    pub switch_blocking: SwitchBlocking,
    /// Track points scored while active
    pub scoring: bool,
}

impl ModeSettings {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            lifecycle: Lifecycle::Manual,
            switch_blocking: SwitchBlocking::None,
            scoring: false,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn blocking(mut self, blocking: SwitchBlocking) -> Self {
        self.switch_blocking = blocking;
        self
    }

    pub fn with_scoring(mut self) -> Self {
        self.scoring = true;
        self
    }
}

/// Outputs a mode drives outside its handler table, checked at registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wiring {
    pub switches: Vec<String>,
    pub lamps: Vec<String>,
    pub coils: Vec<String>,
}

impl Wiring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switches(mut self, names: &[&str]) -> Self {
        self.switches.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn lamps(mut self, names: &[&str]) -> Self {
        self.lamps.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn coils(mut self, names: &[&str]) -> Self {
        self.coils.extend(names.iter().map(|n| n.to_string()));
        self
    }
}

/// Behaviour of a mode
pub trait Mode: Sized + 'static {
    /// Events this mode reacts to; built once at registration
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
    }

    /// Lamps, coils and switches used outside the handler table
    fn wiring(&self) -> Wiring {
        Wiring::default()
    }

    fn mode_started(&mut self, _cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        Ok(())
    }

    fn mode_stopped(&mut self, _cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        Ok(())
    }

    /// Called once per tick while active, after due callbacks fired
    fn mode_tick(&mut self, _cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        Ok(())
    }

    /// Display layer, if the mode shows anything
    fn layer(&mut self) -> Option<&mut Layer> {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SLOT
// ═══════════════════════════════════════════════════════════════════════════════

/// A mode value together with its components
pub(crate) struct Slot<M: Mode> {
    pub(crate) settings: ModeSettings,
    pub(crate) mode: M,
    pub(crate) handlers: HandlerTable<M>,
    pub(crate) timers: DelayQueue<M>,
    pub(crate) points: Option<u64>,
}

impl<M: Mode> Slot<M> {
    pub(crate) fn new(settings: ModeSettings, mode: M) -> Self {
        let handlers = mode.handlers();
        let points = settings.scoring.then_some(0);
        Self {
            settings,
            mode,
            handlers,
            timers: DelayQueue::new(),
            points,
        }
    }
}

/// Type-erased view of a [`Slot`] used by the stack and the runtime
pub(crate) trait ModeObject {
    fn settings(&self) -> &ModeSettings;

    fn dispatch(&mut self, rt: &mut Runtime, id: ModeId, event: &Event) -> HandlerResult;

    fn started(&mut self, rt: &mut Runtime, id: ModeId) -> PfResult<()>;

    /// Runs `mode_stopped` then drops the callbacks of the stopped run.
    /// Callbacks scheduled at or after `before_seq` survive only when the
    /// mode was re-added before the hook ran.
    fn stopped(&mut self, rt: &mut Runtime, id: ModeId, before_seq: u64) -> PfResult<()>;

    fn tick(&mut self, rt: &mut Runtime, id: ModeId) -> PfResult<()>;

    fn next_due(&self, now: Timestamp, watermark: u64) -> Option<(Timestamp, u64)>;

    /// Fire the earliest due callback; returns its name and outcome
    fn fire_due(
        &mut self,
        rt: &mut Runtime,
        id: ModeId,
        now: Timestamp,
        watermark: u64,
    ) -> Option<(String, PfResult<()>)>;

    fn pending_delays(&self) -> Vec<String>;

    fn points(&self) -> Option<u64>;

    fn layer(&mut self) -> Option<&mut Layer>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<M: Mode> ModeObject for Slot<M> {
    fn settings(&self) -> &ModeSettings {
        &self.settings
    }

    fn dispatch(&mut self, rt: &mut Runtime, id: ModeId, event: &Event) -> HandlerResult {
        let blocking = if event.key.is_switch() {
            self.settings.switch_blocking
        } else {
            SwitchBlocking::None
        };
        let Some(handler) = self.handlers.get(&event.key) else {
            return Ok(Flow::stop_if(blocking == SwitchBlocking::All));
        };
        let mut cx = ModeCx::new(id, &mut self.timers, &mut self.points, rt);
        let flow = handler(&mut self.mode, &mut cx, event)?;
        match blocking {
            SwitchBlocking::None => Ok(flow),
            SwitchBlocking::Handled | SwitchBlocking::All => Ok(Flow::Stop),
        }
    }

    fn started(&mut self, rt: &mut Runtime, id: ModeId) -> PfResult<()> {
        if self.settings.scoring {
            self.points = Some(0);
        }
        let mut cx = ModeCx::new(id, &mut self.timers, &mut self.points, rt);
        self.mode.mode_started(&mut cx)
    }

    fn stopped(&mut self, rt: &mut Runtime, id: ModeId, before_seq: u64) -> PfResult<()> {
        let hook_seq = rt.seq;
        let result = {
            let mut cx = ModeCx::new(id, &mut self.timers, &mut self.points, rt);
            self.mode.mode_stopped(&mut cx)
        };
        let dropped = if rt.stack.is_active(id) {
            // Re-added while its handler ran: keep what the new run scheduled
            self.timers
                .cancel_where(|entry| entry.seq < before_seq || entry.seq >= hook_seq)
        } else {
            self.timers.cancel_all()
        };
        if dropped > 0 {
            log::debug!(
                "Mode '{}' stopped with {} pending callbacks cancelled",
                self.settings.name,
                dropped
            );
        }
        result
    }

    fn tick(&mut self, rt: &mut Runtime, id: ModeId) -> PfResult<()> {
        let mut cx = ModeCx::new(id, &mut self.timers, &mut self.points, rt);
        self.mode.mode_tick(&mut cx)
    }

    fn next_due(&self, now: Timestamp, watermark: u64) -> Option<(Timestamp, u64)> {
        self.timers.next_due(now, watermark)
    }

    fn fire_due(
        &mut self,
        rt: &mut Runtime,
        id: ModeId,
        now: Timestamp,
        watermark: u64,
    ) -> Option<(String, PfResult<()>)> {
        let entry = self.timers.pop_due(now, watermark)?;
        let mut cx = ModeCx::new(id, &mut self.timers, &mut self.points, rt);
        let result = (entry.handler)(&mut self.mode, &mut cx);
        Some((entry.name, result))
    }

    fn pending_delays(&self) -> Vec<String> {
        self.timers.names().map(str::to_string).collect()
    }

    fn points(&self) -> Option<u64> {
        self.points
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        self.mode.layer()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
