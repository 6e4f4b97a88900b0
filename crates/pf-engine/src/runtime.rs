//! Engine runtime
//!
//! Everything a running mode can reach lives here. Slots are taken out of
//! the stack while their code runs, so a handler holds `&mut` to its own
//! mode and `&mut Runtime` at the same time. Work aimed at a mode whose slot
//! is out (its own removal, a nested event) is deferred or skipped.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use pf_core::{Clock, MachineConfig, PfError, PfResult, SwitchBank};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::mode::ModeObject;
use crate::stack::{ModeStack, StackOp};
use crate::{events, BallEnd, Event, Flow, Game, Lifecycle, ModeId, Outputs, Services, SwitchRouter};

pub(crate) struct Runtime {
    pub config: MachineConfig,
    pub clock: Clock,
    /// Machine-wide insertion counter for delays and hold checks
    pub seq: u64,
    pub switches: SwitchBank,
    pub outputs: Outputs,
    pub game: Game,
    pub services: Services,
    pub rng: ChaCha8Rng,
    pub stack: ModeStack,
    pub router: SwitchRouter,
}

enum Due {
    Held,
    Mode(ModeId),
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        *text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "non-string panic payload"
    }
}

impl Runtime {
    pub fn new(config: MachineConfig, outputs: Outputs) -> Self {
        Self {
            clock: Clock::new(config.tick_period_ms),
            seq: 0,
            switches: SwitchBank::new(config.switches.iter().cloned()),
            game: Game::new(config.gameplay.balls_per_game),
            services: Services::new(),
            rng: ChaCha8Rng::seed_from_u64(config.gameplay.rng_seed),
            stack: ModeStack::new(),
            router: SwitchRouter::new(),
            outputs,
            config,
        }
    }

    #[inline]
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    /// Run `f` on a mode's slot with errors and panics contained. Queued
    /// lifecycle hooks run once the slot is back.
    fn with_slot<R>(
        &mut self,
        id: ModeId,
        what: &dyn fmt::Display,
        f: impl FnOnce(&mut dyn ModeObject, &mut Runtime) -> PfResult<R>,
    ) -> Option<R> {
        let mut slot = self.stack.take(id)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(slot.as_mut(), self)));
        self.stack.restore(id, slot);
        let result = match outcome {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                log::error!("Mode '{}' failed in {}: {}", self.stack.name(id), what, err);
                None
            }
            Err(payload) => {
                log::error!(
                    "Mode '{}' panicked in {}: {}",
                    self.stack.name(id),
                    what,
                    panic_message(payload.as_ref())
                );
                None
            }
        };
        self.apply_pending();
        result
    }

    fn run_hook(&mut self, id: ModeId, op: StackOp) {
        match op {
            StackOp::Start => {
                self.with_slot(id, &"mode_started", |slot, rt| slot.started(rt, id));
            }
            StackOp::Stop { before_seq } => {
                self.with_slot(id, &"mode_stopped", |slot, rt| slot.stopped(rt, id, before_seq));
            }
        }
    }

    fn apply_pending(&mut self) {
        while let Some((id, op)) = self.stack.next_ready() {
            log::trace!("Running deferred {:?} for '{}'", op, self.stack.name(id));
            self.run_hook(id, op);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MODE STACK
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_mode(&mut self, id: ModeId) -> PfResult<bool> {
        let name = self.stack.meta(id)?.name.clone();
        if !self.stack.activate(id) {
            log::debug!("Mode '{}' is already active", name);
            return Ok(false);
        }
        log::debug!("Mode '{}' added", name);
        if self.stack.is_busy(id) {
            self.stack.defer(id, StackOp::Start);
        } else {
            self.run_hook(id, StackOp::Start);
        }
        Ok(true)
    }

    pub fn remove_mode(&mut self, id: ModeId) -> PfResult<bool> {
        self.stack.meta(id)?;
        if !self.stack.deactivate(id) {
            return Ok(false);
        }
        log::debug!("Mode '{}' removed", self.stack.name(id));
        let op = StackOp::Stop { before_seq: self.seq };
        if self.stack.is_busy(id) {
            self.stack.defer(id, op);
        } else {
            self.run_hook(id, op);
        }
        Ok(true)
    }

    fn add_lifecycle(&mut self, lifecycle: Lifecycle) {
        for id in self.stack.with_lifecycle(lifecycle) {
            if let Err(err) = self.add_mode(id) {
                log::error!("Could not add mode {}: {}", id, err);
            }
        }
    }

    fn remove_lifecycle(&mut self, lifecycle: Lifecycle) {
        for id in self.stack.active_with_lifecycle(lifecycle) {
            if let Err(err) = self.remove_mode(id) {
                log::error!("Could not remove mode {}: {}", id, err);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DISPATCH
    // ═══════════════════════════════════════════════════════════════════════

    /// Deliver `event` top-down over a snapshot of the active set
    pub fn dispatch(&mut self, event: &Event) -> Flow {
        log::trace!("Dispatching {}", event.key);
        for id in self.stack.snapshot() {
            if !self.stack.is_active(id) || self.stack.is_busy(id) {
                continue;
            }
            let flow = self
                .with_slot(id, &event.key, |slot, rt| slot.dispatch(rt, id, event))
                .unwrap_or_default();
            if flow.is_stop() {
                log::trace!("{} stopped at '{}'", event.key, self.stack.name(id));
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    pub fn send_event(&mut self, name: &str) -> Flow {
        let event = Event::named(name, self.clock.now());
        self.dispatch(&event)
    }

    /// Fire every hold check and delayed callback due now that was
    /// scheduled before `watermark`, in (fire time, insertion) order
    pub fn run_due(&mut self, watermark: u64) -> usize {
        let mut fired = 0;
        loop {
            let now = self.clock.now();
            let mut best = self
                .router
                .next_due(now, watermark)
                .map(|key| (key, Due::Held));
            for id in self.stack.active() {
                let Some(slot) = self.stack.slot(*id) else {
                    continue;
                };
                if let Some(key) = slot.next_due(now, watermark) {
                    if best.as_ref().is_none_or(|(earliest, _)| key < *earliest) {
                        best = Some((key, Due::Mode(*id)));
                    }
                }
            }

            match best {
                None => break,
                Some((_, Due::Held)) => {
                    let Some(check) = self.router.pop_due(now, watermark) else {
                        break;
                    };
                    if check.still_held(&self.switches) {
                        self.dispatch(&Event::new(check.key(), check.fire_at));
                    }
                }
                Some((_, Due::Mode(id))) => {
                    self.with_slot(id, &"delayed callback", |slot, rt| {
                        match slot.fire_due(rt, id, now, watermark) {
                            Some((name, result)) => result.map_err(|err| {
                                PfError::Handler(format!("delay '{}': {}", name, err))
                            }),
                            None => Ok(()),
                        }
                    });
                }
            }
            fired += 1;
        }
        fired
    }

    pub fn tick_modes(&mut self) {
        for id in self.stack.snapshot() {
            if self.stack.is_active(id) && !self.stack.is_busy(id) {
                self.with_slot(id, &"mode_tick", |slot, rt| slot.tick(rt, id));
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // GAME FLOW
    // ═══════════════════════════════════════════════════════════════════════

    /// Stop everything and bring up system and attract modes
    pub fn reset(&mut self) {
        log::info!("Machine reset");
        for id in self.stack.snapshot().into_iter().rev() {
            if let Err(err) = self.remove_mode(id) {
                log::error!("Could not remove mode {}: {}", id, err);
            }
        }
        self.game = Game::new(self.config.gameplay.balls_per_game);
        self.router.clear();
        self.outputs.enable_flippers(false);
        self.add_lifecycle(Lifecycle::System);
        self.add_lifecycle(Lifecycle::Attract);
    }

    pub fn start_game(&mut self) -> PfResult<()> {
        self.game.begin()?;
        log::info!("Game started");
        self.remove_lifecycle(Lifecycle::Attract);
        self.add_lifecycle(Lifecycle::Game);
        self.send_event(events::GAME_STARTED);
        self.add_player()?;
        self.start_ball();
        Ok(())
    }

    pub fn add_player(&mut self) -> PfResult<usize> {
        let index = self.game.add_player()?;
        log::info!("Player {} added", index + 1);
        self.send_event(events::PLAYER_ADDED);
        Ok(index)
    }

    pub fn start_ball(&mut self) {
        log::info!(
            "Ball {} starting for player {}",
            self.game.ball(),
            self.game.current_index() + 1
        );
        self.add_lifecycle(Lifecycle::Ball);
        self.send_event(events::BALL_STARTING);
    }

    pub fn end_ball(&mut self) -> PfResult<()> {
        if !self.game.is_in_progress() {
            return Err(PfError::Game("no game in progress".into()));
        }
        self.send_event(events::BALL_ENDING);
        self.remove_lifecycle(Lifecycle::Ball);
        match self.game.end_ball()? {
            BallEnd::ShootAgain => {
                log::info!("Shoot again");
                self.start_ball();
            }
            BallEnd::NextBall { .. } => self.start_ball(),
            BallEnd::GameOver => self.finish_game(),
        }
        Ok(())
    }

    pub fn end_game(&mut self) -> PfResult<()> {
        if !self.game.is_in_progress() {
            return Err(PfError::Game("no game in progress".into()));
        }
        self.remove_lifecycle(Lifecycle::Ball);
        self.game.end();
        self.finish_game();
        Ok(())
    }

    fn finish_game(&mut self) {
        log::info!("Game over");
        self.remove_lifecycle(Lifecycle::Game);
        self.outputs.enable_flippers(false);
        self.add_lifecycle(Lifecycle::Attract);
        self.send_event(events::GAME_ENDED);
    }
}
