//! Headless machine loop: replays a switch script against the rules and
//! records what the machine did.

use std::collections::BTreeMap;
use std::fmt;

use pf_core::{CoilCommand, HwCommand, MachineConfig, PfError, PfResult, RecordingHardware, Timestamp};
use pf_dmd::Frame;
use pf_engine::Machine;
use pf_rules::{RuleSet, UltimateChallenge};
use serde::Serialize;

use crate::script::Script;

/// Clock value of the first tick
const START_MS: u64 = 1_000;

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct PlayerReport {
    pub name: String,
    pub score: u64,
}

/// What the machine looked like when the run ended
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub simulated_ms: u64,
    pub frames: u64,
    pub switch_events: usize,
    pub skipped_events: usize,
    pub game_in_progress: bool,
    pub ball: u32,
    pub players: Vec<PlayerReport>,
    pub active_modes: Vec<String>,
    /// Ultimate Challenge stage while the challenge runs
    pub challenge_stage: Option<String>,
    pub coil_pulses: BTreeMap<String, usize>,
    pub sounds: Vec<String>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Simulated {:.1} s ({} frames, {} switch events)",
            self.simulated_ms as f64 / 1000.0,
            self.frames,
            self.switch_events
        )?;
        if self.skipped_events > 0 {
            writeln!(f, "Skipped {} unknown switch event(s)", self.skipped_events)?;
        }
        if self.game_in_progress {
            writeln!(f, "Game in progress, ball {}", self.ball)?;
        } else {
            writeln!(f, "Game over")?;
        }
        for player in &self.players {
            writeln!(f, "  {:<10} {:>12}", player.name, player.score)?;
        }
        writeln!(f, "Active modes: {}", self.active_modes.join(", "))?;
        if let Some(stage) = &self.challenge_stage {
            writeln!(f, "Ultimate Challenge: {}", stage)?;
        }
        if !self.coil_pulses.is_empty() {
            writeln!(f, "Coil pulses:")?;
            for (coil, count) in &self.coil_pulses {
                writeln!(f, "  {:<20} {}", coil, count)?;
            }
        }
        write!(f, "Sounds: {}", self.sounds.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Simulator {
    machine: Machine,
    hw: RecordingHardware,
    rules: RuleSet,
    tick_ms: u64,
}

impl Simulator {
    /// Machine with the Judge Dredd rules installed and reset to attract
    pub fn new(config: MachineConfig) -> PfResult<Self> {
        let tick_ms = config.tick_period_ms.max(1);
        let hw = RecordingHardware::new();
        let mut machine = Machine::new(config, Box::new(hw.clone()))?;
        let rules = pf_rules::install(&mut machine)?;
        machine.reset();
        Ok(Self {
            machine,
            hw,
            rules,
            tick_ms,
        })
    }

    /// Run for `duration_ms` of machine time. Script steps fire on the
    /// first tick at or after their time; `on_frame` sees every rendered
    /// frame.
    pub fn run(
        &mut self,
        script: &Script,
        duration_ms: u64,
        mut on_frame: impl FnMut(u64, &Frame),
    ) -> PfResult<Report> {
        let mut steps = script.steps.iter().peekable();
        let mut elapsed = 0;
        let mut frames = 0;
        let mut switch_events = 0;
        let mut skipped_events = 0;

        while elapsed <= duration_ms {
            let now = Timestamp(START_MS + elapsed);
            while let Some(step) = steps.next_if(|step| step.at_ms <= elapsed) {
                match self.machine.on_switch_event(&step.switch, step.state, now) {
                    Ok(_) => switch_events += 1,
                    Err(PfError::UnknownSwitch(name)) => {
                        log::warn!("Skipping step at {} ms: unknown switch {}", step.at_ms, name);
                        skipped_events += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            let frame = self.machine.tick(now);
            frames += 1;
            on_frame(frames, &frame);
            elapsed += self.tick_ms;
        }

        log::info!("Simulation finished after {} frames", frames);
        Ok(self.report(elapsed.saturating_sub(self.tick_ms), frames, switch_events, skipped_events))
    }

    fn report(&self, simulated_ms: u64, frames: u64, switch_events: usize, skipped_events: usize) -> Report {
        let game = self.machine.game();
        let players = game
            .players()
            .iter()
            .map(|player| PlayerReport {
                name: player.name.clone(),
                score: player.score,
            })
            .collect();
        let active_modes = self
            .machine
            .active_modes()
            .into_iter()
            .filter_map(|id| self.machine.mode_name(id).map(str::to_string))
            .collect();

        let challenge_stage = if self.machine.is_active(self.rules.challenge) {
            self.machine
                .mode::<UltimateChallenge>(self.rules.challenge)
                .map(|challenge| challenge.stage().name().to_string())
        } else {
            None
        };

        let mut coil_pulses = BTreeMap::new();
        for command in self.hw.commands() {
            if let HwCommand::Coil {
                name,
                command: CoilCommand::Pulse { .. },
            } = command
            {
                *coil_pulses.entry(name).or_insert(0) += 1;
            }
        }

        Report {
            simulated_ms,
            frames,
            switch_events,
            skipped_events,
            game_in_progress: game.is_in_progress(),
            ball: game.ball(),
            players,
            active_modes,
            challenge_stage,
            coil_pulses,
            sounds: self.hw.sounds(),
        }
    }
}
