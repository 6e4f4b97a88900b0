//! Machine facade
//!
//! Owns the runtime and the compositor. The platform layer feeds it switch
//! transitions and ticks; tests drive it the same way with explicit
//! timestamps.

use pf_core::{Hardware, MachineConfig, PfError, PfResult, SwitchBank, SwitchEvent, SwitchState, Timestamp};
use pf_dmd::{Compositor, DisplaySink, Frame, compose_layers};

use crate::mode::Slot;
use crate::runtime::Runtime;
use crate::{Event, EventKey, Flow, Game, Mode, ModeId, ModeSettings, Outputs};

pub struct Machine {
    rt: Runtime,
    compositor: Compositor,
    display: Option<Box<dyn DisplaySink>>,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.rt.config.name)
            .field("modes", &self.rt.stack.len())
            .field("active", &self.rt.stack.active())
            .field("now", &self.rt.clock.now())
            .finish()
    }
}

impl Machine {
    /// Validate `config` and build an idle machine. No mode is active until
    /// [`Machine::reset`] or an explicit [`Machine::add_mode`].
    pub fn new(config: MachineConfig, hardware: Box<dyn Hardware>) -> PfResult<Self> {
        config.validate()?;
        log::info!(
            "Machine '{}': {} switches, {} lamps, {} coils",
            config.name,
            config.switches.len(),
            config.lamps.len(),
            config.coils.len()
        );
        let compositor = Compositor::new(config.dmd_width, config.dmd_height);
        let outputs = Outputs::new(&config, hardware);
        Ok(Self {
            rt: Runtime::new(config, outputs),
            compositor,
            display: None,
        })
    }

    pub fn set_display(&mut self, display: Box<dyn DisplaySink>) {
        self.display = Some(display);
    }

    pub fn config(&self) -> &MachineConfig {
        &self.rt.config
    }

    // ═══════════════════════════════════════════════════════════════════════
    // REGISTRATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Register a mode. Malformed handler tables, unknown switches and
    /// unknown lamps or coils in the mode's wiring are rejected here.
    pub fn register<M: Mode>(&mut self, settings: ModeSettings, mode: M) -> PfResult<ModeId> {
        let mut slot = Slot::new(settings, mode);
        slot.handlers.check()?;

        let wiring = slot.mode.wiring();
        let switches = slot
            .handlers
            .switches()
            .chain(wiring.switches.iter().map(String::as_str));
        for switch in switches {
            if !self.rt.config.has_switch(switch) {
                return Err(PfError::UnknownSwitch(switch.to_string()));
            }
        }
        self.rt.outputs.verify(&wiring)?;

        for (switch, state, ms) in slot.handlers.held_checks() {
            self.rt.router.watch(&switch, state, ms);
        }
        let name = slot.settings.name.clone();
        let handlers = slot.handlers.len();
        let id = self.rt.stack.register(Box::new(slot));
        log::debug!("Registered mode '{}' as {} ({} handlers)", name, id, handlers);
        Ok(id)
    }

    pub fn insert_service<T: 'static>(&mut self, service: T) {
        self.rt.services.insert(service);
    }

    pub fn service<T: 'static>(&self) -> PfResult<&T> {
        self.rt.services.get::<T>()
    }

    pub fn service_mut<T: 'static>(&mut self) -> PfResult<&mut T> {
        self.rt.services.get_mut::<T>()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MODE STACK
    // ═══════════════════════════════════════════════════════════════════════

    /// Activate a mode; `Ok(false)` if it was already active
    pub fn add_mode(&mut self, id: ModeId) -> PfResult<bool> {
        self.rt.add_mode(id)
    }

    /// Deactivate a mode; `Ok(false)` if it was not active
    pub fn remove_mode(&mut self, id: ModeId) -> PfResult<bool> {
        self.rt.remove_mode(id)
    }

    #[inline]
    pub fn is_active(&self, id: ModeId) -> bool {
        self.rt.stack.is_active(id)
    }

    /// Active modes, highest priority first
    pub fn active_modes(&self) -> Vec<ModeId> {
        self.rt.stack.snapshot()
    }

    pub fn mode_name(&self, id: ModeId) -> Option<&str> {
        self.rt.stack.meta(id).ok().map(|meta| meta.name.as_str())
    }

    /// Borrow a registered mode's value
    pub fn mode<M: Mode>(&self, id: ModeId) -> Option<&M> {
        self.rt
            .stack
            .slot(id)?
            .as_any()
            .downcast_ref::<Slot<M>>()
            .map(|slot| &slot.mode)
    }

    pub fn mode_mut<M: Mode>(&mut self, id: ModeId) -> Option<&mut M> {
        self.rt
            .stack
            .slot_mut(id)?
            .as_any_mut()
            .downcast_mut::<Slot<M>>()
            .map(|slot| &mut slot.mode)
    }

    /// Points scored while the mode was active, for scoring modes
    pub fn mode_points(&self, id: ModeId) -> Option<u64> {
        self.rt.stack.slot(id)?.points()
    }

    /// Names of the mode's pending delayed callbacks
    pub fn pending_delays(&self, id: ModeId) -> Vec<String> {
        self.rt
            .stack
            .slot(id)
            .map(|slot| slot.pending_delays())
            .unwrap_or_default()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INPUT & TIME
    // ═══════════════════════════════════════════════════════════════════════

    /// Feed one switch transition. Repeated states are ignored.
    pub fn on_switch_event(&mut self, name: &str, state: SwitchState, timestamp: Timestamp) -> PfResult<Flow> {
        let event = SwitchEvent::new(name, state, timestamp);
        if !self.rt.switches.apply(&event)? {
            log::trace!("Ignoring repeated {} {}", name, state);
            return Ok(Flow::Continue);
        }
        self.rt.clock.observe(timestamp);
        let rt = &mut self.rt;
        rt.router.on_transition(&event, &mut rt.seq);
        Ok(rt.dispatch(&Event::new(EventKey::switch(name, state), timestamp)))
    }

    /// Dispatch a named event now
    pub fn send_event(&mut self, name: &str) -> Flow {
        self.rt.send_event(name)
    }

    /// Advance to `now`: fire due checks and callbacks, run mode ticks,
    /// then compose and present one frame
    pub fn tick(&mut self, now: Timestamp) -> Frame {
        if !self.rt.clock.advance_to(now) {
            log::warn!("Tick at {} is behind the clock ({})", now, self.rt.clock.now());
        }
        let watermark = self.rt.seq;
        let fired = self.rt.run_due(watermark);
        if fired > 0 {
            log::trace!("Frame {}: {} callbacks", self.rt.clock.frame(), fired);
        }
        self.rt.tick_modes();

        let frame = self.render_frame();
        if let Some(display) = self.display.as_mut() {
            display.present(&frame);
        }
        frame
    }

    /// Compose the active modes' layers, topmost opaque wins
    pub fn render_frame(&mut self) -> Frame {
        let now = self.rt.clock.now();
        compose_layers(&self.compositor, self.rt.stack.layers_top_down(), now)
    }

    #[inline]
    pub fn now(&self) -> Timestamp {
        self.rt.clock.now()
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.rt.clock.frame()
    }

    pub fn switches(&self) -> &SwitchBank {
        &self.rt.switches
    }

    pub fn outputs(&self) -> &Outputs {
        &self.rt.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut Outputs {
        &mut self.rt.outputs
    }

    // ═══════════════════════════════════════════════════════════════════════
    // GAME FLOW
    // ═══════════════════════════════════════════════════════════════════════

    pub fn game(&self) -> &Game {
        &self.rt.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.rt.game
    }

    /// Stop every mode and bring up system and attract modes
    pub fn reset(&mut self) {
        self.rt.reset();
    }

    pub fn start_game(&mut self) -> PfResult<()> {
        self.rt.start_game()
    }

    pub fn add_player(&mut self) -> PfResult<usize> {
        self.rt.add_player()
    }

    pub fn end_ball(&mut self) -> PfResult<()> {
        self.rt.end_ball()
    }

    pub fn end_game(&mut self) -> PfResult<()> {
        self.rt.end_game()
    }
}
