//! Judge Dredd playfield
//!
//! Names of the switches, lamps and coils the rules address, plus the
//! default [`MachineConfig`] describing the machine.

use std::collections::HashMap;

use pf_core::{GameplaySettings, MachineConfig};

// ═══════════════════════════════════════════════════════════════════════════════
// SWITCHES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod sw {
    // Cabinet
    pub const START_BUTTON: &str = "startButton";
    pub const SUPER_GAME: &str = "superGame";
    pub const FIRE_L: &str = "fireL";
    pub const FIRE_R: &str = "fireR";
    pub const FLIPPER_L: &str = "flipperLwL";
    pub const FLIPPER_R: &str = "flipperLwR";
    pub const TILT: &str = "tilt";
    pub const SLAM_TILT: &str = "slamTilt";
    pub const COIN_DOOR: &str = "coinDoor";

    // Ball path
    pub const OUTHOLE: &str = "outhole";
    pub const SHOOTER_L: &str = "shooterL";
    pub const SHOOTER_R: &str = "shooterR";
    pub const POPPER_L: &str = "popperL";
    pub const POPPER_R: &str = "popperR";

    // Loops and orbits
    pub const LEFT_ROLLOVER: &str = "leftRollover";
    pub const TOP_RIGHT_OPTO: &str = "topRightOpto";
    pub const TOP_CENTER_ROLLOVER: &str = "topCenterRollover";

    // Ramps
    pub const LEFT_RAMP_ENTER: &str = "leftRampEnter";
    pub const LEFT_RAMP_EXIT: &str = "leftRampExit";
    pub const LEFT_RAMP_TO_LOCK: &str = "leftRampToLock";
    pub const RIGHT_RAMP_EXIT: &str = "rightRampExit";

    // Targets
    pub const DROP_TARGETS: [&str; 5] = [
        "dropTargetJ",
        "dropTargetU",
        "dropTargetD",
        "dropTargetG",
        "dropTargetE",
    ];
    pub const DROP_TARGET_D: &str = "dropTargetD";
    pub const MYSTERY: &str = "mystery";
    pub const CAPTIVE_BALL_3: &str = "captiveBall3";
    pub const LEFT_SCORE_POST: &str = "leftScorePost";
    pub const RIGHT_TOP_POST: &str = "rightTopPost";
    pub const SUBWAY_ENTER_1: &str = "subwayEnter1";
    pub const SUBWAY_ENTER_2: &str = "subwayEnter2";

    // Lower playfield
    pub const SLING_L: &str = "slingL";
    pub const SLING_R: &str = "slingR";
    pub const INLANE_L: &str = "inlaneL";
    pub const INLANE_R: &str = "inlaneR";
    pub const INLANE_FAR_R: &str = "inlaneFarR";
    pub const OUTLANE_L: &str = "outlaneL";
    pub const OUTLANE_R: &str = "outlaneR";

    /// Shooter lanes and poppers where a ball can come to rest
    pub const BALL_HOLDERS: [&str; 4] = [SHOOTER_L, SHOOTER_R, POPPER_L, POPPER_R];

    /// Activity on any of these proves a ball is moving
    pub const PLAYFIELD: [&str; 23] = [
        LEFT_ROLLOVER,
        TOP_RIGHT_OPTO,
        TOP_CENTER_ROLLOVER,
        LEFT_RAMP_ENTER,
        LEFT_RAMP_EXIT,
        LEFT_RAMP_TO_LOCK,
        RIGHT_RAMP_EXIT,
        MYSTERY,
        CAPTIVE_BALL_3,
        LEFT_SCORE_POST,
        RIGHT_TOP_POST,
        SUBWAY_ENTER_1,
        SUBWAY_ENTER_2,
        SLING_L,
        SLING_R,
        INLANE_L,
        INLANE_R,
        INLANE_FAR_R,
        OUTLANE_L,
        OUTLANE_R,
        "dropTargetJ",
        "dropTargetU",
        "dropTargetG",
    ];
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAMPS
// ═══════════════════════════════════════════════════════════════════════════════

pub mod lamp {
    pub const DRAIN_SHIELD: &str = "drainShield";
    pub const START_BUTTON: &str = "startButton";
    pub const SUPER_GAME: &str = "superGame";
    pub const BUY_IN: &str = "buyIn";
    pub const JUDGE_AGAIN: &str = "judgeAgain";
    pub const EXTRA_BALL: &str = "extraBall2";
    pub const MYSTERY: &str = "mystery";
    pub const STOP_MELTDOWN: &str = "stopMeltdown";
    pub const ULT_CHALLENGE: &str = "ultChallenge";
    pub const PICK_A_PRIZE: &str = "pickAPrize";
    pub const AWARD_SAFECRACKER: &str = "awardSafecracker";
    pub const AWARD_BAD_IMPERSONATOR: &str = "awardBadImpersonator";
    pub const MULTIBALL_JACKPOT: &str = "multiballJackpot";
    pub const RIGHT_START_FEATURE: &str = "rightStartFeature";
    pub const DROP_TARGET_D: &str = "dropTargetD";

    pub const GI: [&str; 5] = ["gi01", "gi02", "gi03", "gi04", "gi05"];

    /// Lamp colours of every perp (crime scene) shot
    pub const PERP_COLORS: [char; 4] = ['W', 'R', 'Y', 'G'];

    /// Name of the lamp of `color` on perp shot `shot` (1..=5)
    pub fn perp(shot: usize, color: char) -> String {
        format!("perp{}{}", shot, color)
    }

    /// All four lamps of perp shot `shot` (1..=5)
    pub fn perp_lamps(shot: usize) -> Vec<String> {
        PERP_COLORS.iter().map(|color| perp(shot, *color)).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COILS
// ═══════════════════════════════════════════════════════════════════════════════

pub mod coil {
    pub const TROUGH: &str = "trough";
    pub const SHOOTER_L: &str = "shooterL";
    pub const SHOOTER_R: &str = "shooterR";
    pub const POPPER_L: &str = "popperL";
    pub const POPPER_R: &str = "popperR";
    pub const RESET_DROP_TARGET: &str = "resetDropTarget";
    pub const TRIP_DROP_TARGET: &str = "tripDropTarget";
    pub const KNOCKER: &str = "knocker";
    pub const GLOBE_MOTOR: &str = "globeMotor";

    pub const FLASHER_PURSUIT_L: &str = "flasherPursuitL";
    pub const FLASHER_PURSUIT_R: &str = "flasherPursuitR";
    pub const FLASHER_FIRE: &str = "flasherFire";
    pub const FLASHER_MORTIS: &str = "flasherMortis";
    pub const FLASHER_FEAR: &str = "flasherFear";
    pub const FLASHER_DEATH: &str = "flasherDeath";
    pub const FLASHER_GLOBE: &str = "flasherGlobe";
    pub const FLASHER_CURSED_EARTH: &str = "flasherCursedEarth";
    pub const FLASHERS_RT_RAMP: &str = "flashersRtRamp";
    pub const FLASHERS_LOWER_LEFT: &str = "flashersLowerLeft";

    /// Coils pulsed in sequence by a ball search
    pub const SEARCH: [&str; 3] = [POPPER_L, POPPER_R, SHOOTER_L];
}

// ═══════════════════════════════════════════════════════════════════════════════
// MACHINE CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

/// Default Judge Dredd machine description
pub fn machine_config() -> MachineConfig {
    let mut switches = names(&[
        sw::START_BUTTON,
        sw::SUPER_GAME,
        sw::FIRE_L,
        sw::FIRE_R,
        sw::FLIPPER_L,
        sw::FLIPPER_R,
        sw::TILT,
        sw::SLAM_TILT,
        sw::COIN_DOOR,
        sw::OUTHOLE,
        sw::SHOOTER_L,
        sw::SHOOTER_R,
        sw::POPPER_L,
        sw::POPPER_R,
        sw::DROP_TARGET_D,
    ]);
    switches.extend(names(&sw::PLAYFIELD));
    switches.push("dropTargetE".to_string());

    let mut lamps = names(&[
        lamp::DRAIN_SHIELD,
        lamp::START_BUTTON,
        lamp::SUPER_GAME,
        lamp::BUY_IN,
        lamp::JUDGE_AGAIN,
        lamp::EXTRA_BALL,
        lamp::MYSTERY,
        lamp::STOP_MELTDOWN,
        lamp::ULT_CHALLENGE,
        lamp::PICK_A_PRIZE,
        lamp::AWARD_SAFECRACKER,
        lamp::AWARD_BAD_IMPERSONATOR,
        lamp::MULTIBALL_JACKPOT,
        lamp::RIGHT_START_FEATURE,
    ]);
    lamps.extend(sw::DROP_TARGETS.iter().map(|name| name.to_string()));
    lamps.extend(names(&lamp::GI));
    for shot in 1..=5 {
        lamps.extend(lamp::perp_lamps(shot));
    }

    let coils = names(&[
        coil::TROUGH,
        coil::SHOOTER_L,
        coil::SHOOTER_R,
        coil::POPPER_L,
        coil::POPPER_R,
        coil::RESET_DROP_TARGET,
        coil::TRIP_DROP_TARGET,
        coil::KNOCKER,
        coil::GLOBE_MOTOR,
        coil::FLASHER_PURSUIT_L,
        coil::FLASHER_PURSUIT_R,
        coil::FLASHER_FIRE,
        coil::FLASHER_MORTIS,
        coil::FLASHER_FEAR,
        coil::FLASHER_DEATH,
        coil::FLASHER_GLOBE,
        coil::FLASHER_CURSED_EARTH,
        coil::FLASHERS_RT_RAMP,
        coil::FLASHERS_LOWER_LEFT,
    ]);

    let coil_pulses = HashMap::from([
        (coil::TROUGH.to_string(), 20),
        (coil::SHOOTER_R.to_string(), 50),
        (coil::SHOOTER_L.to_string(), 20),
        (coil::POPPER_L.to_string(), 50),
        (coil::POPPER_R.to_string(), 20),
        (coil::RESET_DROP_TARGET.to_string(), 40),
        (coil::TRIP_DROP_TARGET.to_string(), 60),
        (coil::KNOCKER.to_string(), 50),
    ]);

    MachineConfig {
        name: "Judge Dredd".to_string(),
        switches,
        lamps,
        coils,
        coil_pulses,
        gameplay: GameplaySettings::default(),
        ..MachineConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_config_is_valid() {
        let config = machine_config();
        assert!(config.validate().is_ok());
        assert!(config.has_switch(sw::OUTHOLE));
        assert!(config.has_switch("dropTargetE"));
        assert!(config.has_lamp(&lamp::perp(4, 'G')));
        assert!(config.has_coil(coil::FLASHERS_LOWER_LEFT));
        assert_eq!(config.pulse_ms(coil::SHOOTER_R), 50);
    }

    #[test]
    fn test_every_drop_target_is_wired() {
        let config = machine_config();
        for target in sw::DROP_TARGETS {
            assert!(config.has_switch(target), "{} missing", target);
            assert!(config.has_lamp(target), "{} lamp missing", target);
        }
    }
}
