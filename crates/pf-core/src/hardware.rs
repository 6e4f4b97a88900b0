//! Hardware command interfaces
//!
//! Rules never talk to driver electronics directly. They emit commands
//! through these narrow capability traits; a platform layer (or the
//! recorder used by tests and the simulator) implements them.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::Schedule;

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lamp output command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LampCommand {
    On,
    Off,
    Schedule {
        schedule: Schedule,
        /// Seconds to run the schedule, 0 = forever
        cycle_seconds: u32,
        /// Start immediately instead of at the next cycle boundary
        now: bool,
    },
}

impl LampCommand {
    /// True if the lamp is driven with any lit steps
    pub fn is_lit(&self) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Schedule { schedule, .. } => schedule.0 != 0,
        }
    }
}

/// Coil output command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoilCommand {
    Pulse { ms: u32 },
    Schedule {
        schedule: Schedule,
        cycle_seconds: u32,
        now: bool,
    },
    Disable,
}

/// Sound command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoundCommand {
    Play { sound: String },
    PlayVoice { sound: String },
    PlayMusic { track: String, loops: i32 },
    StopMusic,
    FadeoutMusic { ms: u32 },
    StopAll,
}

/// Any command emitted by the rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum HwCommand {
    Lamp { name: String, command: LampCommand },
    Coil { name: String, command: CoilCommand },
    Flippers { enabled: bool },
    Sound { command: SoundCommand },
}

// ═══════════════════════════════════════════════════════════════════════════════
// CAPABILITY TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Drives lamps
pub trait LampDriver {
    fn lamp(&mut self, name: &str, command: LampCommand);
}

/// Drives coils and the flipper relay
pub trait CoilDriver {
    fn coil(&mut self, name: &str, command: CoilCommand);

    fn flippers(&mut self, enabled: bool);
}

/// Plays sounds and music
pub trait SoundSink {
    fn sound(&mut self, command: SoundCommand);
}

/// Everything a machine needs from the platform
pub trait Hardware: LampDriver + CoilDriver + SoundSink {}

impl<T: LampDriver + CoilDriver + SoundSink> Hardware for T {}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Discards every command
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHardware;

impl LampDriver for NullHardware {
    fn lamp(&mut self, _name: &str, _command: LampCommand) {}
}

impl CoilDriver for NullHardware {
    fn coil(&mut self, _name: &str, _command: CoilCommand) {}

    fn flippers(&mut self, _enabled: bool) {}
}

impl SoundSink for NullHardware {
    fn sound(&mut self, _command: SoundCommand) {}
}

/// Records every command into a shared log.
///
/// Clones share the log, so a test can keep one handle and give another
/// to the machine.
#[derive(Debug, Clone, Default)]
pub struct RecordingHardware {
    log: Arc<Mutex<Vec<HwCommand>>>,
}

impl RecordingHardware {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, command: HwCommand) {
        log::trace!("hw: {:?}", command);
        self.log.lock().push(command);
    }

    /// Snapshot of all recorded commands
    pub fn commands(&self) -> Vec<HwCommand> {
        self.log.lock().clone()
    }

    /// Drain the recorded commands
    pub fn take(&self) -> Vec<HwCommand> {
        std::mem::take(&mut *self.log.lock())
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    /// Number of pulses sent to a coil
    pub fn pulse_count(&self, coil: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|cmd| {
                matches!(cmd, HwCommand::Coil { name, command: CoilCommand::Pulse { .. } } if name == coil)
            })
            .count()
    }

    /// Most recent command sent to a lamp
    pub fn last_lamp(&self, lamp: &str) -> Option<LampCommand> {
        self.log.lock().iter().rev().find_map(|cmd| match cmd {
            HwCommand::Lamp { name, command } if name == lamp => Some(*command),
            _ => None,
        })
    }

    /// Last flipper relay state, if ever set
    pub fn flippers_enabled(&self) -> Option<bool> {
        self.log.lock().iter().rev().find_map(|cmd| match cmd {
            HwCommand::Flippers { enabled } => Some(*enabled),
            _ => None,
        })
    }

    /// Sounds played through `Play`/`PlayVoice`, in order
    pub fn sounds(&self) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter_map(|cmd| match cmd {
                HwCommand::Sound {
                    command: SoundCommand::Play { sound } | SoundCommand::PlayVoice { sound },
                } => Some(sound.clone()),
                _ => None,
            })
            .collect()
    }
}

impl LampDriver for RecordingHardware {
    fn lamp(&mut self, name: &str, command: LampCommand) {
        self.push(HwCommand::Lamp {
            name: name.to_string(),
            command,
        });
    }
}

impl CoilDriver for RecordingHardware {
    fn coil(&mut self, name: &str, command: CoilCommand) {
        self.push(HwCommand::Coil {
            name: name.to_string(),
            command,
        });
    }

    fn flippers(&mut self, enabled: bool) {
        self.push(HwCommand::Flippers { enabled });
    }
}

impl SoundSink for RecordingHardware {
    fn sound(&mut self, command: SoundCommand) {
        self.push(HwCommand::Sound { command });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_shares_log_between_clones() {
        let recorder = RecordingHardware::new();
        let mut hw = recorder.clone();
        hw.coil("popperL", CoilCommand::Pulse { ms: 30 });
        hw.coil("popperL", CoilCommand::Pulse { ms: 30 });
        hw.lamp("drainShield", LampCommand::On);
        hw.lamp("drainShield", LampCommand::Off);
        hw.flippers(true);

        assert_eq!(recorder.pulse_count("popperL"), 2);
        assert_eq!(recorder.last_lamp("drainShield"), Some(LampCommand::Off));
        assert_eq!(recorder.flippers_enabled(), Some(true));
        assert_eq!(recorder.take().len(), 5);
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_commands_serialize() {
        let cmd = HwCommand::Coil {
            name: "trough".into(),
            command: CoilCommand::Pulse { ms: 20 },
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"target\":\"coil\""));
        let back: HwCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }
}
