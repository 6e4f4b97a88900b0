//! Machine configuration
//!
//! Everything the engine needs to know about a physical machine: switch,
//! lamp and coil names, display geometry, timing and the gameplay settings
//! operators can tune. Loaded from JSON at startup and validated before
//! any mode is wired, so bad names fail at power-on instead of mid-game.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LampStyles, PfError, PfResult};

/// Default frame period (~60 fps)
pub const DEFAULT_TICK_PERIOD_MS: u64 = 16;

/// Default coil pulse when none is configured
pub const DEFAULT_PULSE_MS: u32 = 30;

/// Maximum players in one game
pub const MAX_PLAYERS: usize = 4;

// ═══════════════════════════════════════════════════════════════════════════════
// GAMEPLAY SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Operator-adjustable gameplay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplaySettings {
    pub balls_per_game: u32,
    /// Ball save armed at the start of every ball
    pub ball_save_secs: f64,
    /// Seconds silently added to every ball-save request
    pub ball_save_grace_secs: f64,
    /// Seconds without playfield activity before a ball search
    pub ball_search_secs: f64,
    /// Ball search countdown after the first unsuccessful round
    pub ball_search_retry_secs: f64,
    pub max_extra_balls_per_game: u32,
    pub max_extra_balls_lit: u32,
    pub skill_shot_secs: f64,
    pub balls_in_machine: u32,
    /// Seed for the deterministic rules RNG
    pub rng_seed: u64,
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self {
            balls_per_game: 3,
            ball_save_secs: 5.0,
            ball_save_grace_secs: 2.0,
            ball_search_secs: 20.0,
            ball_search_retry_secs: 10.0,
            max_extra_balls_per_game: 4,
            max_extra_balls_lit: 2,
            skill_shot_secs: 7.0,
            balls_in_machine: 6,
            rng_seed: 0x6a64_6472,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MACHINE CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete machine description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub name: String,
    pub switches: Vec<String>,
    pub lamps: Vec<String>,
    pub coils: Vec<String>,
    /// Per-coil default pulse in ms
    pub coil_pulses: HashMap<String, u32>,
    pub tick_period_ms: u64,
    pub dmd_width: usize,
    pub dmd_height: usize,
    pub lamp_styles: LampStyles,
    pub gameplay: GameplaySettings,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: "Playfield".to_string(),
            switches: Vec::new(),
            lamps: Vec::new(),
            coils: Vec::new(),
            coil_pulses: HashMap::new(),
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            dmd_width: 128,
            dmd_height: 32,
            lamp_styles: LampStyles::default(),
            gameplay: GameplaySettings::default(),
        }
    }
}

impl MachineConfig {
    /// Load and validate a configuration file
    pub fn load_from<P: AsRef<Path>>(path: P) -> PfResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        log::info!(
            "Loaded machine config '{}' from {}: {} switches, {} lamps, {} coils",
            config.name,
            path.display(),
            config.switches.len(),
            config.lamps.len(),
            config.coils.len()
        );
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> PfResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to specified path
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> PfResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check internal consistency
    pub fn validate(&self) -> PfResult<()> {
        if self.tick_period_ms == 0 {
            return Err(PfError::Config("tick_period_ms must be positive".into()));
        }
        if self.dmd_width == 0 || self.dmd_height == 0 {
            return Err(PfError::Config(format!(
                "display size {}x{} is empty",
                self.dmd_width, self.dmd_height
            )));
        }
        if self.gameplay.balls_per_game == 0 {
            return Err(PfError::Config("balls_per_game must be at least 1".into()));
        }
        if self.gameplay.ball_save_secs < 0.0 || self.gameplay.ball_save_grace_secs < 0.0 {
            return Err(PfError::Config("ball save times must not be negative".into()));
        }
        check_unique("switch", &self.switches)?;
        check_unique("lamp", &self.lamps)?;
        check_unique("coil", &self.coils)?;
        for coil in self.coil_pulses.keys() {
            if !self.coils.iter().any(|c| c == coil) {
                return Err(PfError::UnknownCoil(coil.clone()));
            }
        }
        Ok(())
    }

    /// Default pulse time for a coil
    pub fn pulse_ms(&self, coil: &str) -> u32 {
        self.coil_pulses
            .get(coil)
            .copied()
            .unwrap_or(DEFAULT_PULSE_MS)
    }

    pub fn has_switch(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s == name)
    }

    pub fn has_lamp(&self, name: &str) -> bool {
        self.lamps.iter().any(|l| l == name)
    }

    pub fn has_coil(&self, name: &str) -> bool {
        self.coils.iter().any(|c| c == name)
    }
}

fn check_unique(kind: &str, names: &[String]) -> PfResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(PfError::Config(format!("empty {} name", kind)));
        }
        if !seen.insert(name.as_str()) {
            return Err(PfError::Config(format!("duplicate {} '{}'", kind, name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MachineConfig {
        MachineConfig {
            switches: vec!["shooterR".into(), "outhole".into()],
            lamps: vec!["drainShield".into()],
            coils: vec!["trough".into()],
            coil_pulses: HashMap::from([("trough".to_string(), 20)]),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(MachineConfig::default().validate().is_ok());
        assert_eq!(GameplaySettings::default().ball_save_grace_secs, 2.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = MachineConfig::from_json(r#"{ "switches": ["startButton"] }"#).unwrap();
        assert_eq!(config.tick_period_ms, DEFAULT_TICK_PERIOD_MS);
        assert_eq!(config.gameplay.balls_per_game, 3);
        assert!(config.has_switch("startButton"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = sample();
        config.switches.push("outhole".into());
        assert!(matches!(config.validate(), Err(PfError::Config(_))));
    }

    #[test]
    fn test_pulse_for_unknown_coil_rejected() {
        let mut config = sample();
        config.coil_pulses.insert("flasher".into(), 40);
        assert!(matches!(config.validate(), Err(PfError::UnknownCoil(_))));
    }

    #[test]
    fn test_pulse_defaults() {
        let config = sample();
        assert_eq!(config.pulse_ms("trough"), 20);
        assert_eq!(config.pulse_ms("other"), DEFAULT_PULSE_MS);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.json");
        let config = sample();
        config.save_to(&path).unwrap();
        let loaded = MachineConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = MachineConfig::load_from("/definitely/not/here.json");
        assert!(matches!(result, Err(PfError::Io(_))));
    }
}
