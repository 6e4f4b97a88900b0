//! Ultimate Challenge
//!
//! The wizard mode. Every stage opens with a scrolling intro, then runs as
//! its own mode until its goal is met or it fails. A completed stage waits
//! for all of its balls to drain before the next intro starts; a failed one
//! lets the drain end the ball, and the player resumes the same stage later.
//! After the four Dark Judges comes a six ball celebration, which hands
//! back to regular play once a single ball remains.

mod celebration;
mod death;
mod fear;
mod fire;
mod intro;
mod mortis;

pub use celebration::Celebration;
pub use death::Death;
pub use fear::{Fear, FearState, Ramp};
pub use fire::Fire;
pub use intro::{IntroMode, IntroRequest};
pub use mortis::Mortis;

use pf_core::{PfResult, Schedule};
use pf_dmd::Layer;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};
use serde::{Deserialize, Serialize};

use crate::display;
use crate::playfield::{coil, lamp, sw};
use crate::{BALL_DRAINED, BallSaver, BonusCounters, CaptiveBalls, RuleSet, Trough};
use crate::{CHALLENGE_FINISHED, INTRO_FINISHED, STAGE_COMPLETE};

/// Points for every lit shot made during a Dark Judge stage
pub const SHOT_POINTS: u64 = 10_000;

const TAUNT: &str = "taunt";
const FIRST_TAUNT_SECS: f64 = 5.0;
const TAUNT_SECS: f64 = 10.0;

/// Ball in the right popper is kicked out this long after the intro
const EJECT_SECS: f64 = 0.8;

// ═══════════════════════════════════════════════════════════════════════════════
// STAGES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Fire,
    Mortis,
    Fear,
    Death,
    Celebration,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Fire,
        Stage::Mortis,
        Stage::Fear,
        Stage::Death,
        Stage::Celebration,
    ];

    /// Stage after this one; the celebration wraps around to Fire
    pub fn next(self) -> Stage {
        match self {
            Stage::Fire => Stage::Mortis,
            Stage::Mortis => Stage::Fear,
            Stage::Fear => Stage::Death,
            Stage::Death => Stage::Celebration,
            Stage::Celebration => Stage::Fire,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Fire => "Fire",
            Stage::Mortis => "Mortis",
            Stage::Fear => "Fear",
            Stage::Death => "Death",
            Stage::Celebration => "Celebration",
        }
    }

    /// Intro text, one display line per entry
    pub fn instructions(self) -> &'static [&'static str] {
        match self {
            Stage::Fire => &[
                "", "", "ULTIMATE", "CHALLENGE", "", "DEFEAT THE DARK JUDGES", "", "STAGE 1", "",
                "JUDGE FIRE IS CREATING", "CHAOS BY LIGHTING FIRES", "ALL OVER MEGA CITY ONE", "",
                "EXTINGUISH FIRES AND", "BANISH JUDGE FIRE BY", "SHOOTING THE LIT", "CRIMESCENE SHOTS", "",
                "4 BALL MULTIBALL", "NO BALL SAVE",
            ],
            Stage::Mortis => &[
                "", "", "ULTIMATE", "CHALLENGE", "", "STAGE 2", "", "JUDGE MORTIS IS SPREADING",
                "DISEASE THROUGHOUT", "THE CITY", "", "BANISH HIM BY SHOOTING", "EACH LIT SHOT TWICE", "",
                "2 BALL MULTIBALL WITH", "TEMPORARY BALL SAVE",
            ],
            Stage::Fear => &[
                "", "", "ULTIMATE", "CHALLENGE", "", "STAGE 3", "", "JUDGE FEAR IS REIGNING",
                "TERROR ON THE CITY", "", "BANISH HIM BY SHOOTING", "THE LIT RAMP SHOTS AND",
                "THEN THE SUBWAY BEFORE", "TIME RUNS OUT", "", "1 BALL WITH", "TEMPORARY BALL SAVE",
            ],
            Stage::Death => &[
                "", "", "ULTIMATE", "CHALLENGE", "", "STAGE 4", "", "JUDGE DEATH IS ON", "A MURDER SPREE", "",
                "BANISH HIM BY SHOOTING", "THE LIT CRIMESCENE SHOTS", "BEFORE TIME EXPIRES", "",
                "SHOTS SLOWLY RE-LIGHT", "SO FINISH HIM QUICKLY", "", "1 BALL WITH",
                "TEMPORARY BALL SAVE",
            ],
            Stage::Celebration => &[
                "", "", "CONGRATS", "", "THE DARK JUDGES HAVE", "ALL BEEN BANISHED", "",
                "ENJOY A 6-BALL", "CELEBRATION MULTIBALL", "ALL SHOTS SCORE", "",
                "NORMAL PLAY RESUMES", "WHEN ONLY 1 BALL REMAINS",
            ],
        }
    }
}

/// Where the current player stands in the challenge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeProgress {
    pub stage: Stage,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAGE HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Score card a stage shows while it runs, then its result banner
#[derive(Debug, Default)]
struct StageCard {
    layer: Option<Layer>,
    shown: Option<(u64, Option<u32>)>,
    over: bool,
}

impl StageCard {
    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Redraw with the player's score and an optional countdown
    fn update(&mut self, title: &str, score: u64, timer: Option<u32>) {
        if self.over || self.shown == Some((score, timer)) {
            return;
        }
        self.shown = Some((score, timer));
        let caption = match timer {
            Some(secs) => format!("{}  {}", title, secs),
            None => title.to_string(),
        };
        self.layer = Some(display::caption_card(&caption, &display::format_points(score)));
    }

    fn banner(&mut self, text: &str) {
        self.over = true;
        self.layer = Some(display::banner(text));
    }

    #[inline]
    fn is_over(&self) -> bool {
        self.over
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        self.layer.as_mut()
    }
}

fn player_score<M: Mode>(cx: &ModeCx<'_, M>) -> u64 {
    cx.game().current_player().map_or(0, |player| player.score)
}

/// Voice taunt after 5 s, then every 10 s
fn start_taunts<M: Mode>(cx: &mut ModeCx<'_, M>, voice: &'static str) {
    taunt_after(cx, voice, FIRST_TAUNT_SECS);
}

fn taunt_after<M: Mode>(cx: &mut ModeCx<'_, M>, voice: &'static str, secs: f64) {
    cx.delay(TAUNT, secs, move |_, cx| {
        cx.outputs().play_voice(voice);
        taunt_after(cx, voice, TAUNT_SECS);
        Ok(())
    });
}

/// Count a banished Dark Judge and tell the challenge. Flippers die so the
/// remaining balls drain.
fn judge_defeated<M: Mode>(cx: &mut ModeCx<'_, M>, card: &mut StageCard, stage: Stage) -> PfResult<()> {
    log::info!("{} defeated", stage.name());
    cx.cancel_delayed(TAUNT);
    cx.outputs().enable_flippers(false);
    cx.update_player_state(|counters: &mut BonusCounters| counters.dark_judges += 1)?;
    card.banner(&format!("{} Defeated!", stage.name()));
    cx.send_event(STAGE_COMPLETE);
    Ok(())
}

/// The stage ran out of time; the ball plays out without flippers
fn stage_failed<M: Mode>(cx: &mut ModeCx<'_, M>, card: &mut StageCard, stage: Stage) {
    log::info!("{} stage failed", stage.name());
    cx.cancel_delayed(TAUNT);
    cx.outputs().enable_flippers(false);
    card.banner("You lose!");
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHALLENGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs the stages in order and decides what a drain means
#[derive(Debug, Default)]
pub struct UltimateChallenge {
    stage: Stage,
    /// Goal met; the stage ends once its balls have drained
    level_complete: bool,
    /// Kick the right popper ball out when the intro ends
    eject: bool,
}

impl UltimateChallenge {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[inline]
    pub fn is_level_complete(&self) -> bool {
        self.level_complete
    }

    fn rules(cx: &mut ModeCx<'_, Self>) -> PfResult<RuleSet> {
        Ok(*cx.service::<RuleSet>()?)
    }

    fn start_intro(&mut self, cx: &mut ModeCx<'_, Self>, eject: bool) -> PfResult<()> {
        log::info!("Challenge intro for {}", self.stage.name());
        self.level_complete = false;
        self.eject = eject;
        if eject {
            cx.service::<CaptiveBalls>()?.mark_captive(sw::POPPER_R);
        }
        *cx.service::<IntroRequest>()? = IntroRequest {
            stage: self.stage,
            eject,
        };
        cx.outputs().enable_flippers(true);
        let rules = Self::rules(cx)?;
        cx.add_mode(rules.intro)?;
        Ok(())
    }

    fn complete_level(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.level_complete = true;
        cx.service::<BallSaver>()?.disable();
        cx.outputs().fadeout_music(500);
        Ok(())
    }

    fn eject_popper(cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.outputs().pulse(coil::POPPER_R, 20);
        cx.service::<CaptiveBalls>()?.release(sw::POPPER_R);
        Ok(())
    }

    // ─── handlers ───

    fn intro_finished(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let rules = Self::rules(cx)?;
        // Celebration is complete the moment it starts; its ball save must
        // outlive the completion
        if self.stage == Stage::Celebration {
            self.complete_level(cx)?;
        }
        cx.add_mode(rules.stage(self.stage))?;
        cx.outputs().play_music("mode", -1);
        if std::mem::take(&mut self.eject) {
            cx.outputs()
                .schedule_coil(coil::FLASHERS_RT_RAMP, Schedule(0x0055_5555), 1, true);
            cx.delay("eject", EJECT_SECS, |_, cx| Self::eject_popper(cx));
        }
        Ok(Flow::Continue)
    }

    fn stage_complete(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.complete_level(cx)?;
        Ok(Flow::Continue)
    }

    fn ball_drained(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if !self.level_complete {
            return Ok(Flow::Continue);
        }
        let rules = Self::rules(cx)?;
        let balls = cx.service::<Trough>()?.balls_requested();

        if self.stage == Stage::Celebration {
            if balls > 1 {
                return Ok(Flow::Stop);
            }
            log::info!("Celebration over, back to regular play");
            cx.remove_mode(rules.celebration)?;
            cx.outputs().enable_flippers(true);
            cx.remove_self()?;
            cx.send_event(CHALLENGE_FINISHED);
            return Ok(Flow::Continue);
        }

        if balls == 0 {
            cx.remove_mode(rules.stage(self.stage))?;
            self.stage = self.stage.next();
            cx.set_player_state(ChallengeProgress { stage: self.stage })?;
            self.start_intro(cx, false)?;
        }
        Ok(Flow::Stop)
    }

    fn hold_left_shooter(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().pulse_default(coil::SHOOTER_L);
        Ok(Flow::Stop)
    }
}

impl Mode for UltimateChallenge {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on_event(INTRO_FINISHED, Self::intro_finished)
            .on_event(STAGE_COMPLETE, Self::stage_complete)
            .on_event(BALL_DRAINED, Self::ball_drained)
            .on("sw_shooterL_active_for_200ms", Self::hold_left_shooter)
    }

    fn wiring(&self) -> Wiring {
        Wiring::new()
            .switches(&[sw::POPPER_R, sw::SHOOTER_L])
            .coils(&[
                coil::POPPER_R,
                coil::SHOOTER_L,
                coil::RESET_DROP_TARGET,
                coil::FLASHERS_RT_RAMP,
            ])
            .lamps(&[lamp::ULT_CHALLENGE])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let progress: ChallengeProgress = cx.player_state();
        self.stage = progress.stage;
        cx.outputs().pulse(coil::RESET_DROP_TARGET, 40);
        cx.outputs().enable_lamp(lamp::ULT_CHALLENGE);
        let eject = cx.switches().is_active(sw::POPPER_R);
        self.start_intro(cx, eject)
    }

    fn mode_stopped(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let stage = match self.stage {
            Stage::Celebration => Stage::Fire,
            stage => stage,
        };
        if cx.game().current_player().is_some() {
            cx.set_player_state(ChallengeProgress { stage })?;
        }
        let rules = Self::rules(cx)?;
        cx.remove_mode(rules.intro)?;
        for stage in Stage::ALL {
            cx.remove_mode(rules.stage(stage))?;
        }
        cx.outputs().disable_lamp(lamp::ULT_CHALLENGE);
        cx.service::<CaptiveBalls>()?.release(sw::POPPER_R);
        self.eject = false;
        self.level_complete = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_wraps() {
        let mut stage = Stage::Fire;
        let mut seen = vec![stage];
        for _ in 0..5 {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            [
                Stage::Fire,
                Stage::Mortis,
                Stage::Fear,
                Stage::Death,
                Stage::Celebration,
                Stage::Fire
            ]
        );
    }

    #[test]
    fn test_every_stage_has_instructions() {
        for stage in Stage::ALL {
            let text = stage.instructions();
            assert!(text.len() > 10, "{:?}", stage);
        }
    }

    #[test]
    fn test_stage_card_keeps_banner() {
        let mut card = StageCard::default();
        card.update("Fear", 0, Some(20));
        assert!(card.layer().is_some());
        card.banner("Fear Defeated!");
        card.update("Fear", 10_000, Some(19));
        assert!(card.is_over());
        assert_eq!(card.shown, Some((0, Some(20))));
    }
}
