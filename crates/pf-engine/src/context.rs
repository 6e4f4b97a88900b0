//! Per-call mode context
//!
//! Every hook, handler and delayed callback receives a [`ModeCx`]. It is the
//! only way rules reach the rest of the machine: outputs, switches, game and
//! player state, services, the mode stack and the mode's own delays.

use pf_core::{MachineConfig, PfResult, SwitchBank, Timestamp};
use rand_chacha::ChaCha8Rng;

use crate::runtime::Runtime;
use crate::{DelayQueue, Flow, Game, Mode, ModeId, Outputs};

pub struct ModeCx<'a, M> {
    id: ModeId,
    timers: &'a mut DelayQueue<M>,
    points: &'a mut Option<u64>,
    rt: &'a mut Runtime,
}

impl<'a, M: Mode> ModeCx<'a, M> {
    pub(crate) fn new(
        id: ModeId,
        timers: &'a mut DelayQueue<M>,
        points: &'a mut Option<u64>,
        rt: &'a mut Runtime,
    ) -> Self {
        Self {
            id,
            timers,
            points,
            rt,
        }
    }

    /// Id of the mode this context belongs to
    #[inline]
    pub fn id(&self) -> ModeId {
        self.id
    }

    #[inline]
    pub fn now(&self) -> Timestamp {
        self.rt.clock.now()
    }

    /// Ticks since power-on
    #[inline]
    pub fn frame(&self) -> u64 {
        self.rt.clock.frame()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DELAYS
    // ═══════════════════════════════════════════════════════════════════════

    /// Run `handler` no earlier than `seconds` from now. A pending delay with
    /// the same name is replaced.
    pub fn delay<F>(&mut self, name: &str, seconds: f64, handler: F)
    where
        F: FnOnce(&mut M, &mut ModeCx<'_, M>) -> PfResult<()> + 'static,
    {
        let fire_at = self.now().after_secs(seconds);
        let seq = self.rt.next_seq();
        if self.timers.schedule(name, fire_at, seq, Box::new(handler)) {
            log::trace!("Delay '{}' re-armed for {}", name, fire_at);
        }
    }

    pub fn cancel_delayed(&mut self, name: &str) -> bool {
        self.timers.cancel(name)
    }

    pub fn cancel_delayed_all(&mut self, names: &[&str]) {
        for name in names {
            self.timers.cancel(name);
        }
    }

    #[inline]
    pub fn is_delayed(&self, name: &str) -> bool {
        self.timers.is_pending(name)
    }

    /// Seconds until `name` fires
    pub fn delay_remaining(&self, name: &str) -> Option<f64> {
        self.timers
            .remaining(name, self.now())
            .map(|ms| ms as f64 / 1000.0)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MACHINE
    // ═══════════════════════════════════════════════════════════════════════

    #[inline]
    pub fn switches(&self) -> &SwitchBank {
        &self.rt.switches
    }

    #[inline]
    pub fn outputs(&mut self) -> &mut Outputs {
        &mut self.rt.outputs
    }

    #[inline]
    pub fn config(&self) -> &MachineConfig {
        &self.rt.config
    }

    #[inline]
    pub fn game(&self) -> &Game {
        &self.rt.game
    }

    #[inline]
    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.rt.game
    }

    /// Deterministic rules RNG
    #[inline]
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rt.rng
    }

    pub fn service<T: 'static>(&mut self) -> PfResult<&mut T> {
        self.rt.services.get_mut::<T>()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SCORING & PLAYER STATE
    // ═══════════════════════════════════════════════════════════════════════

    /// Add to the current player's score; ignored outside a game
    pub fn score(&mut self, points: u64) {
        let Some(player) = self.rt.game.current_player_mut() else {
            log::trace!("Score of {} outside a game ignored", points);
            return;
        };
        player.score += points;
        if let Some(total) = self.points.as_mut() {
            *total += points;
        }
    }

    /// Points scored while this mode has been active
    pub fn mode_points(&self) -> Option<u64> {
        *self.points
    }

    /// Current player's value, or the default outside a game
    pub fn player_state<T: Clone + Default + 'static>(&self) -> T {
        self.rt
            .game
            .current_player()
            .map(|player| player.state.get::<T>())
            .unwrap_or_default()
    }

    pub fn set_player_state<T: 'static>(&mut self, value: T) -> PfResult<()> {
        self.rt.game.current_player_or_err()?.state.set(value);
        Ok(())
    }

    pub fn update_player_state<T: Default + 'static, R>(
        &mut self,
        f: impl FnOnce(&mut T) -> R,
    ) -> PfResult<R> {
        Ok(self.rt.game.current_player_or_err()?.state.update(f))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MODE STACK & EVENTS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_mode(&mut self, id: ModeId) -> PfResult<bool> {
        self.rt.add_mode(id)
    }

    pub fn remove_mode(&mut self, id: ModeId) -> PfResult<bool> {
        self.rt.remove_mode(id)
    }

    /// Leave the stack; `mode_stopped` runs once the current call returns
    pub fn remove_self(&mut self) -> PfResult<bool> {
        self.rt.remove_mode(self.id)
    }

    #[inline]
    pub fn is_active(&self, id: ModeId) -> bool {
        self.rt.stack.is_active(id)
    }

    /// Dispatch a named event synchronously; this mode is skipped
    pub fn send_event(&mut self, name: &str) -> Flow {
        self.rt.send_event(name)
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
