//! Output drivers
//!
//! Thin wrapper over the platform [`Hardware`] that knows the configured
//! lamp and coil names. Rules address outputs by name; names missing from
//! the configuration are caught at registration through [`Outputs::verify`]
//! and otherwise logged and skipped at runtime.

use std::collections::{HashMap, HashSet};

use pf_core::{
    CoilCommand, Hardware, LampCommand, LampStyle, LampStyles, MachineConfig, PfError, PfResult,
    Schedule, SoundCommand,
};

use crate::Wiring;

pub struct Outputs {
    hardware: Box<dyn Hardware>,
    lamps: HashSet<String>,
    coils: HashSet<String>,
    pulses: HashMap<String, u32>,
    styles: LampStyles,
    /// Last command sent to each lamp
    lamp_states: HashMap<String, LampCommand>,
    flippers: bool,
}

impl std::fmt::Debug for Outputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outputs")
            .field("lamps", &self.lamps.len())
            .field("coils", &self.coils.len())
            .field("flippers", &self.flippers)
            .finish()
    }
}

impl Outputs {
    pub fn new(config: &MachineConfig, hardware: Box<dyn Hardware>) -> Self {
        Self {
            hardware,
            lamps: config.lamps.iter().cloned().collect(),
            coils: config.coils.iter().cloned().collect(),
            pulses: config.coil_pulses.clone(),
            styles: config.lamp_styles,
            lamp_states: HashMap::new(),
            flippers: false,
        }
    }

    #[inline]
    pub fn has_lamp(&self, name: &str) -> bool {
        self.lamps.contains(name)
    }

    #[inline]
    pub fn has_coil(&self, name: &str) -> bool {
        self.coils.contains(name)
    }

    /// Fail on any lamp or coil the configuration does not know
    pub fn verify(&self, wiring: &Wiring) -> PfResult<()> {
        if let Some(lamp) = wiring.lamps.iter().find(|l| !self.has_lamp(l)) {
            return Err(PfError::UnknownLamp(lamp.clone()));
        }
        if let Some(coil) = wiring.coils.iter().find(|c| !self.has_coil(c)) {
            return Err(PfError::UnknownCoil(coil.clone()));
        }
        Ok(())
    }

    fn known_coil(&self, name: &str) -> bool {
        if self.has_coil(name) {
            true
        } else {
            log::warn!("Ignoring command for unknown coil '{}'", name);
            false
        }
    }

    fn known_lamp(&self, name: &str) -> bool {
        if self.has_lamp(name) {
            true
        } else {
            log::warn!("Ignoring command for unknown lamp '{}'", name);
            false
        }
    }

    // ─── coils ───────────────────────────────────────────────────────────────

    pub fn pulse(&mut self, coil: &str, ms: u32) {
        if self.known_coil(coil) {
            self.hardware.coil(coil, CoilCommand::Pulse { ms });
        }
    }

    /// Pulse with the coil's configured default time
    pub fn pulse_default(&mut self, coil: &str) {
        let ms = self
            .pulses
            .get(coil)
            .copied()
            .unwrap_or(pf_core::DEFAULT_PULSE_MS);
        self.pulse(coil, ms);
    }

    pub fn schedule_coil(&mut self, coil: &str, schedule: Schedule, cycle_seconds: u32, now: bool) {
        if self.known_coil(coil) {
            self.hardware.coil(
                coil,
                CoilCommand::Schedule {
                    schedule,
                    cycle_seconds,
                    now,
                },
            );
        }
    }

    pub fn disable_coil(&mut self, coil: &str) {
        if self.known_coil(coil) {
            self.hardware.coil(coil, CoilCommand::Disable);
        }
    }

    pub fn enable_flippers(&mut self, enabled: bool) {
        self.flippers = enabled;
        self.hardware.flippers(enabled);
    }

    #[inline]
    pub fn flippers_enabled(&self) -> bool {
        self.flippers
    }

    // ─── lamps ───────────────────────────────────────────────────────────────

    fn send_lamp(&mut self, lamp: &str, command: LampCommand) {
        if self.known_lamp(lamp) {
            self.lamp_states.insert(lamp.to_string(), command);
            self.hardware.lamp(lamp, command);
        }
    }

    pub fn enable_lamp(&mut self, lamp: &str) {
        self.send_lamp(lamp, LampCommand::On);
    }

    pub fn disable_lamp(&mut self, lamp: &str) {
        self.send_lamp(lamp, LampCommand::Off);
    }

    pub fn schedule_lamp(&mut self, lamp: &str, schedule: Schedule, cycle_seconds: u32, now: bool) {
        self.send_lamp(
            lamp,
            LampCommand::Schedule {
                schedule,
                cycle_seconds,
                now,
            },
        );
    }

    /// Drive a lamp with a named style
    pub fn drive_lamp(&mut self, lamp: &str, style: LampStyle) {
        match style {
            LampStyle::On => self.enable_lamp(lamp),
            LampStyle::Off => self.disable_lamp(lamp),
            LampStyle::Slow | LampStyle::Medium | LampStyle::Fast => {
                let schedule = self.styles.schedule_for(style);
                self.schedule_lamp(lamp, schedule, 0, true);
            }
        }
    }

    pub fn lamp_state(&self, lamp: &str) -> Option<LampCommand> {
        self.lamp_states.get(lamp).copied()
    }

    pub fn is_lamp_lit(&self, lamp: &str) -> bool {
        self.lamp_state(lamp).map(|c| c.is_lit()).unwrap_or(false)
    }

    pub fn disable_all_lamps(&mut self) {
        let mut lamps: Vec<String> = self.lamps.iter().cloned().collect();
        lamps.sort();
        for lamp in lamps {
            self.disable_lamp(&lamp);
        }
    }

    // ─── sound ───────────────────────────────────────────────────────────────

    pub fn play_sound(&mut self, sound: &str) {
        self.hardware.sound(SoundCommand::Play {
            sound: sound.to_string(),
        });
    }

    pub fn play_voice(&mut self, sound: &str) {
        self.hardware.sound(SoundCommand::PlayVoice {
            sound: sound.to_string(),
        });
    }

    pub fn play_music(&mut self, track: &str, loops: i32) {
        self.hardware.sound(SoundCommand::PlayMusic {
            track: track.to_string(),
            loops,
        });
    }

    pub fn stop_music(&mut self) {
        self.hardware.sound(SoundCommand::StopMusic);
    }

    pub fn fadeout_music(&mut self, ms: u32) {
        self.hardware.sound(SoundCommand::FadeoutMusic { ms });
    }

    pub fn stop_all_sounds(&mut self) {
        self.hardware.sound(SoundCommand::StopAll);
    }
}
