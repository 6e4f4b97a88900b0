//! pf-rules: Judge Dredd rule set
//!
//! The modes that make up a game on the Judge Dredd playfield, built on
//! `pf-engine`:
//! - Trough, ball save, ball search and stall search (system plumbing)
//! - Attract loop with regular and supergame starts
//! - Base play, skill shot and end-of-ball bonus
//! - Ultimate Challenge: intro, four Dark Judge stages and the celebration
//!
//! ## Mode stack
//!
//! ```text
//!  prio  mode                 lifecycle
//!  210   status line          system
//!  199   stall search         system
//!  100   ball search          added by base play
//!   96   ball save            system
//!   95   trough               system
//!   13   skill shot           added by base play
//!    9   challenge intro      added by the challenge
//!    9   fire/mortis/fear/... added by the challenge
//!    8   ultimate challenge   added by base play
//!    8   bonus                added by base play
//!    3   base play            ball
//!    2   attract              attract
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut machine = Machine::new(pf_rules::machine_config(), Box::new(hardware))?;
//! let rules = pf_rules::install(&mut machine)?;
//! machine.reset();
//! machine.on_switch_event("startButton", SwitchState::Active, Timestamp(1_000))?;
//! ```

mod attract;
mod ball_save;
mod ball_search;
mod base_play;
mod bonus;
pub mod challenge;
pub mod display;
pub mod playfield;
mod skill_shot;
mod stall_search;
mod status;
mod trough;

pub use attract::*;
pub use ball_save::*;
pub use ball_search::*;
pub use base_play::*;
pub use bonus::*;
pub use challenge::{ChallengeProgress, IntroMode, IntroRequest, Stage, UltimateChallenge};
pub use playfield::machine_config;
pub use skill_shot::*;
pub use stall_search::*;
pub use status::*;
pub use trough::*;

use pf_core::PfResult;
use pf_engine::{Lifecycle, Machine, ModeId, ModeSettings, SwitchBlocking};
use serde::{Deserialize, Serialize};

use challenge::{Celebration, Death, Fear, Fire, Mortis};

// ═══════════════════════════════════════════════════════════════════════════════
// RULE EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// The player plunged the ball
pub const BALL_STARTED: &str = "evt_ball_started";
pub const BONUS_FINISHED: &str = "evt_bonus_finished";
/// A ball rested 500 ms in the left shooter lane; `Stop` keeps it there
pub const SHOOTER_L_HELD: &str = "evt_shooterL_active_500ms";
pub const LIGHT_EXTRA_BALL: &str = "evt_light_extra_ball";
pub const INC_BONUS_X: &str = "evt_inc_bonus_x";
pub const HOLD_BONUS_X: &str = "evt_hold_bonus_x";
pub const START_CHALLENGE: &str = "evt_start_challenge";
pub const INTRO_FINISHED: &str = "evt_intro_finished";
pub const STAGE_COMPLETE: &str = "evt_stage_complete";
pub const CHALLENGE_FINISHED: &str = "evt_challenge_finished";

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICES
// ═══════════════════════════════════════════════════════════════════════════════

/// Choices made at the start button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOptions {
    /// The game starts straight into the Ultimate Challenge
    pub supergame: bool,
}

/// Ids of every installed rule mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSet {
    pub status_line: ModeId,
    pub stall_search: ModeId,
    pub ball_search: ModeId,
    pub ball_save: ModeId,
    pub trough: ModeId,
    pub skill_shot: ModeId,
    pub intro: ModeId,
    pub fire: ModeId,
    pub mortis: ModeId,
    pub fear: ModeId,
    pub death: ModeId,
    pub celebration: ModeId,
    pub challenge: ModeId,
    pub bonus: ModeId,
    pub base_play: ModeId,
    pub attract: ModeId,
}

impl RuleSet {
    /// Mode running `stage`
    pub fn stage(&self, stage: Stage) -> ModeId {
        match stage {
            Stage::Fire => self.fire,
            Stage::Mortis => self.mortis,
            Stage::Fear => self.fear,
            Stage::Death => self.death,
            Stage::Celebration => self.celebration,
        }
    }
}

/// Register the rule modes and their services. The machine still needs a
/// `reset()` to bring up the system and attract modes.
pub fn install(machine: &mut Machine) -> PfResult<RuleSet> {
    let grace = machine.config().gameplay.ball_save_grace_secs;
    machine.insert_service(Trough::new());
    machine.insert_service(BallSaver::new(grace));
    machine.insert_service(StatusBoard::new());
    machine.insert_service(CaptiveBalls::new());
    machine.insert_service(GameOptions::default());
    machine.insert_service(IntroRequest::default());

    let system = |name: &str, priority| ModeSettings::new(name, priority).with_lifecycle(Lifecycle::System);
    let stage = |name: &str| {
        ModeSettings::new(name, 9)
            .blocking(SwitchBlocking::Handled)
            .with_scoring()
    };

    let rules = RuleSet {
        status_line: machine.register(system("status_line", 210), StatusLineMode::new())?,
        stall_search: machine.register(system("stall_search", 199), StallSearchMode::new())?,
        ball_search: machine.register(ModeSettings::new("ball_search", 100), BallSearchMode::new())?,
        ball_save: machine.register(system("ball_save", 96), BallSaveMode::new())?,
        trough: machine.register(system("trough", 95), TroughMode::new())?,
        skill_shot: machine.register(ModeSettings::new("skill_shot", 13), SkillShotMode::new())?,
        intro: machine.register(ModeSettings::new("challenge_intro", 9), IntroMode::new())?,
        fire: machine.register(stage("fire"), Fire::new())?,
        mortis: machine.register(stage("mortis"), Mortis::new())?,
        fear: machine.register(stage("fear"), Fear::new())?,
        death: machine.register(stage("death"), Death::new())?,
        celebration: machine.register(stage("celebration"), Celebration::new())?,
        challenge: machine.register(
            ModeSettings::new("ultimate_challenge", 8).with_scoring(),
            UltimateChallenge::new(),
        )?,
        bonus: machine.register(ModeSettings::new("bonus", 8), BonusMode::new())?,
        base_play: machine.register(
            ModeSettings::new("base_play", 3)
                .with_lifecycle(Lifecycle::Ball)
                .with_scoring(),
            BasePlay::new(),
        )?,
        attract: machine.register(
            ModeSettings::new("attract", 2).with_lifecycle(Lifecycle::Attract),
            AttractMode::new(),
        )?,
    };
    machine.insert_service(rules);
    log::info!("Judge Dredd rules installed");
    Ok(rules)
}
