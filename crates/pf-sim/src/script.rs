//! Switch scripts
//!
//! A script is a list of timed switch transitions:
//!
//! ```json
//! { "steps": [
//!     { "at_ms": 500, "switch": "startButton", "state": "active" },
//!     { "at_ms": 550, "switch": "startButton", "state": "inactive" }
//! ] }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use pf_core::{MachineConfig, SwitchState};
use pf_rules::playfield::sw;
use serde::{Deserialize, Serialize};

/// How long a hit switch stays closed
const HIT_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    pub switch: String,
    pub state: SwitchState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a script; steps are put in time order, ties keep file order
    pub fn from_json(json: &str) -> Result<Self> {
        let mut script: Script = serde_json::from_str(json).context("Malformed switch script")?;
        script.steps.sort_by_key(|step| step.at_ms);
        Ok(script)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        let script = Self::from_json(&json)?;
        log::info!("Loaded {} step(s) from {}", script.steps.len(), path.display());
        Ok(script)
    }

    /// Time of the last step
    pub fn end_ms(&self) -> u64 {
        self.steps.last().map_or(0, |step| step.at_ms)
    }

    /// Switches the machine does not know about
    pub fn unknown_switches<'a>(&'a self, config: &MachineConfig) -> Vec<&'a str> {
        let mut unknown: Vec<&str> = self
            .steps
            .iter()
            .map(|step| step.switch.as_str())
            .filter(|name| !config.has_switch(name))
            .collect();
        unknown.sort_unstable();
        unknown.dedup();
        unknown
    }

    /// Built-in demo: three regular balls, or a supergame that clears
    /// Judge Fire
    pub fn demo(supergame: bool) -> Self {
        let mut script = ScriptBuilder::new();
        script.wait(500);
        if supergame {
            script.hit(sw::SUPER_GAME).wait(1_000);
            // Skip the intro, let the multiball balls out
            script.hit(sw::FLIPPER_L).wait(5_000);
            script
                .hit(sw::RIGHT_RAMP_EXIT)
                .wait(500)
                .hold(sw::POPPER_R, 400)
                .wait(500)
                .hit(sw::LEFT_ROLLOVER)
                .hit(sw::TOP_RIGHT_OPTO)
                .hit(sw::LEFT_ROLLOVER)
                .wait(1_200)
                .hit(sw::TOP_CENTER_ROLLOVER)
                .hit(sw::TOP_RIGHT_OPTO)
                .wait(1_000);
            for _ in 0..4 {
                script.hit(sw::OUTHOLE).wait(500);
            }
        } else {
            script.hit(sw::START_BUTTON);
            for _ in 0..3 {
                script.wait(1_000).plunge().wait(1_500);
                // Skill shot
                script.hit(sw::TOP_RIGHT_OPTO).hit(sw::LEFT_ROLLOVER).wait(1_000);
                for target in [sw::SLING_L, sw::RIGHT_RAMP_EXIT, sw::LEFT_RAMP_EXIT, "dropTargetJ"] {
                    script.hit(target).wait(500);
                }
                script.wait(6_000).hit(sw::OUTHOLE).wait(4_000);
            }
        }
        script.build()
    }
}

/// Appends steps at a moving point in time
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    at_ms: u64,
    steps: Vec<Step>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, switch: &str, state: SwitchState) {
        self.steps.push(Step {
            at_ms: self.at_ms,
            switch: switch.to_string(),
            state,
        });
    }

    pub fn wait(&mut self, ms: u64) -> &mut Self {
        self.at_ms += ms;
        self
    }

    pub fn hold(&mut self, switch: &str, ms: u64) -> &mut Self {
        self.push(switch, SwitchState::Active);
        self.at_ms += ms;
        self.push(switch, SwitchState::Inactive);
        self
    }

    pub fn hit(&mut self, switch: &str) -> &mut Self {
        self.hold(switch, HIT_MS)
    }

    /// Ball in the shooter lane, fire button, ball away
    pub fn plunge(&mut self) -> &mut Self {
        self.push(sw::SHOOTER_R, SwitchState::Active);
        self.wait(300).hit(sw::FIRE_R);
        self.push(sw::SHOOTER_R, SwitchState::Inactive);
        self
    }

    pub fn build(&mut self) -> Script {
        Script {
            steps: std::mem::take(&mut self.steps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_steps_are_sorted_by_time() {
        let json = r#"{ "steps": [
            { "at_ms": 900, "switch": "outhole", "state": "active" },
            { "at_ms": 100, "switch": "startButton", "state": "active" },
            { "at_ms": 100, "switch": "startButton", "state": "inactive" }
        ] }"#;
        let script = Script::from_json(json).unwrap();
        let order: Vec<(u64, SwitchState)> =
            script.steps.iter().map(|step| (step.at_ms, step.state)).collect();
        assert_eq!(
            order,
            [
                (100, SwitchState::Active),
                (100, SwitchState::Inactive),
                (900, SwitchState::Active)
            ]
        );
        assert_eq!(script.end_ms(), 900);
    }

    #[test]
    fn test_bad_state_is_rejected() {
        let json = r#"{ "steps": [{ "at_ms": 0, "switch": "outhole", "state": "pressed" }] }"#;
        assert!(Script::from_json(json).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "steps": [{{ "at_ms": 5, "switch": "fireR", "state": "active" }}] }}"#
        )
        .unwrap();
        let script = Script::load(file.path()).unwrap();
        assert_eq!(script.steps.len(), 1);
        assert_eq!(script.steps[0].switch, "fireR");
    }

    #[test]
    fn test_demos_only_use_known_switches() {
        let config = pf_rules::machine_config();
        for supergame in [false, true] {
            let script = Script::demo(supergame);
            assert!(!script.steps.is_empty());
            assert!(script.unknown_switches(&config).is_empty());
        }
    }

    #[test]
    fn test_unknown_switches_are_listed_once() {
        let mut builder = ScriptBuilder::new();
        builder.hit("warpDrive").hit(sw::OUTHOLE).hit("warpDrive");
        let script = builder.build();
        let config = pf_rules::machine_config();
        assert_eq!(script.unknown_switches(&config), ["warpDrive"]);
    }
}
