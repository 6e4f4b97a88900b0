//! Base play
//!
//! Added for every ball. Owns the shooter lanes, the basic playfield
//! scoring, extra balls and bonus X, and the end of ball: the last drain
//! brings up the bonus, and the bonus finishing ends the ball. In a
//! supergame it hands straight over to the Ultimate Challenge.

use pf_core::{LampStyle, PfResult, Schedule, SwitchState};
use pf_dmd::{GroupedLayer, Layer};
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::display::{self, DMD_HEIGHT, DMD_WIDTH};
use crate::playfield::{coil, lamp, sw};
use crate::{
    BALL_SAVED, BALL_STARTED, BONUS_FINISHED, CHALLENGE_FINISHED, HOLD_BONUS_X, INC_BONUS_X,
    LAST_BALL_DRAINED, LIGHT_EXTRA_BALL, SHOOTER_L_HELD, START_CHALLENGE,
};
use crate::{
    BallSaveRequest, BallSaver, BonusCounters, BonusMultiplier, GameOptions, RuleSet, StatusBoard,
    Trough,
};

/// Seconds a flipper is held before the status report shows
pub const STATUS_HOLD_SECS: f64 = 6.0;

/// Seconds text stays on the base display
pub const DISPLAY_SECS: f64 = 3.0;

/// A ball eject waits this long behind its flasher
pub const POP_DELAY_SECS: f64 = 0.8;

const SHOW_STATUS: &str = "show_status";

/// Extra balls of the current player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraBallState {
    /// Lit and waiting to be collected
    pub lit: u32,
    /// Collected this game
    pub total: u32,
}

/// Per-player supergame override; `None` follows the start button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supergame(pub Option<bool>);

/// Kick a ball out of `coil` shortly after its flasher starts
pub fn flash_then_pop<M: Mode>(
    cx: &mut ModeCx<'_, M>,
    flasher: &'static str,
    coil: &'static str,
    pulse_ms: u32,
) {
    cx.outputs()
        .schedule_coil(flasher, Schedule(0x0055_5555), 1, true);
    cx.delay("delayed_pop", POP_DELAY_SECS, move |_, cx| {
        cx.outputs().pulse(coil, pulse_ms);
        Ok(())
    });
}

#[derive(Debug)]
pub struct BasePlay {
    /// The new ball has not been plunged yet
    ball_starting: bool,
    skill_shot_added: bool,
    /// Balls returning to the shooter lane are plunged automatically
    auto_plunge: bool,
    /// [big text, small text, score]
    layer: Layer,
}

impl Default for BasePlay {
    fn default() -> Self {
        Self::new()
    }
}

impl BasePlay {
    pub fn new() -> Self {
        let big = display::centered_text(display::large_font(), 7);
        let small = display::centered_text(display::small_font(), 7);
        let score = display::centered_text(display::large_font(), 17);
        Self {
            ball_starting: false,
            skill_shot_added: false,
            auto_plunge: false,
            layer: Layer::grouped(GroupedLayer::new(
                DMD_WIDTH,
                DMD_HEIGHT,
                vec![Layer::text(big), Layer::text(small), Layer::text(score)],
            )),
        }
    }

    #[inline]
    pub fn is_ball_starting(&self) -> bool {
        self.ball_starting
    }

    #[inline]
    pub fn auto_plunge(&self) -> bool {
        self.auto_plunge
    }

    fn rules(cx: &mut ModeCx<'_, Self>) -> PfResult<RuleSet> {
        Ok(*cx.service::<RuleSet>()?)
    }

    /// Show `text` for a few seconds; large on its own, small over `points`
    pub fn show_on_display(&mut self, text: Option<&str>, points: Option<u64>) {
        let Some(group) = self.layer.as_grouped_mut() else {
            return;
        };
        let points_text = points.map(display::format_points);
        let texts = [
            text.filter(|_| points.is_none()),
            text.filter(|_| points.is_some()),
            points_text.as_deref(),
        ];
        for (layer, text) in group.layers.iter_mut().zip(texts) {
            if let Some(layer) = layer.as_text_mut() {
                layer.set_text(text, Some(DISPLAY_SECS));
            }
        }
    }

    fn update_lamps(cx: &mut ModeCx<'_, Self>) {
        let extra: ExtraBallState = cx.player_state();
        let has_extra = cx
            .game()
            .current_player()
            .is_some_and(|player| player.extra_balls > 0);
        let outputs = cx.outputs();
        for gi in lamp::GI {
            outputs.enable_lamp(gi);
        }
        let style = if has_extra { LampStyle::On } else { LampStyle::Off };
        outputs.drive_lamp(lamp::JUDGE_AGAIN, style);
        let style = if extra.lit > 0 { LampStyle::Slow } else { LampStyle::Off };
        outputs.drive_lamp(lamp::EXTRA_BALL, style);
    }

    fn status_report(cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let multiplier: BonusMultiplier = cx.player_state();
        let extra: ExtraBallState = cx.player_state();
        let report = format!(
            "Ball {}  Bonus {}X  Extra Balls {}",
            cx.game().ball(),
            multiplier.x,
            extra.lit
        );
        cx.service::<StatusBoard>()?.post_still(report);
        Ok(())
    }

    // ─── end of ball ───

    fn finish_ball(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        log::info!("Ball {} finished", cx.game().ball());
        let rules = Self::rules(cx)?;
        cx.outputs().fadeout_music(500);
        cx.remove_mode(rules.ball_search)?;
        cx.remove_mode(rules.skill_shot)?;
        cx.remove_mode(rules.challenge)?;
        cx.outputs().disable_coil(coil::GLOBE_MOTOR);
        cx.outputs().enable_flippers(false);
        cx.add_mode(rules.bonus)?;
        Self::update_lamps(cx);
        Ok(())
    }

    fn light_extra_ball(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let extra: ExtraBallState = cx.player_state();
        let settings = &cx.config().gameplay;
        let (max_per_game, max_lit) = (settings.max_extra_balls_per_game, settings.max_extra_balls_lit);
        if extra.lit + extra.total >= max_per_game {
            cx.service::<StatusBoard>()?.post("No more extras this game.");
        } else if extra.lit >= max_lit {
            cx.service::<StatusBoard>()?.post("Extra balls lit maxed.");
        } else {
            cx.update_player_state(|extra: &mut ExtraBallState| extra.lit += 1)?;
            Self::update_lamps(cx);
            self.show_on_display(Some("Extra Ball Lit!"), None);
        }
        Ok(())
    }

    // ─── handlers ───

    fn flipper_pressed(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.delay(SHOW_STATUS, STATUS_HOLD_SECS, |_, cx| Self::status_report(cx));
        Ok(Flow::Continue)
    }

    fn flipper_released(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.cancel_delayed(SHOW_STATUS);
        Ok(Flow::Continue)
    }

    fn fire_right(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if cx.switches().is_active(sw::SHOOTER_R) {
            cx.outputs().pulse(coil::SHOOTER_R, 50);
            if self.ball_starting {
                cx.outputs().stop_music();
                cx.outputs().play_music("background", -1);
            }
        }
        Ok(Flow::Continue)
    }

    fn ball_launched(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("ball_launch");
        Ok(Flow::Continue)
    }

    /// The plunged ball stayed out of the shooter lane for a second
    fn ball_plunged(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.auto_plunge = true;
        if std::mem::take(&mut self.ball_starting) {
            log::debug!("Ball {} started", cx.game().ball());
            cx.send_event(BALL_STARTED);
        }
        Ok(Flow::Continue)
    }

    fn shooter_lane_entered(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if !self.ball_starting {
            return Ok(Flow::Continue);
        }
        cx.outputs().play_music("ball_launch", -1);
        let rules = Self::rules(cx)?;
        // The ball may bounce on the lane switch
        if !self.skill_shot_added && !cx.is_active(rules.challenge) {
            cx.add_mode(rules.skill_shot)?;
            self.skill_shot_added = true;
        }
        Ok(Flow::Continue)
    }

    fn shooter_lane_resting(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if self.auto_plunge {
            cx.outputs().pulse(coil::SHOOTER_R, 50);
        }
        Ok(Flow::Continue)
    }

    fn left_shooter_held(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if cx.send_event(SHOOTER_L_HELD).is_stop() {
            return Ok(Flow::Continue);
        }
        let pulse = cx.rng().random_range(15..=30);
        cx.outputs().pulse(coil::SHOOTER_L, pulse);
        Ok(Flow::Continue)
    }

    fn left_shooter_launched(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("shooterL_launch");
        Ok(Flow::Continue)
    }

    fn drop_target(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("drop_target");
        cx.score(200);
        Ok(Flow::Continue)
    }

    fn subway(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("subway");
        cx.score(500);
        Ok(Flow::Continue)
    }

    fn left_ramp_enter(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let outputs = cx.outputs();
        outputs.schedule_coil(coil::FLASHER_GLOBE, Schedule(0x0003_3333), 0, true);
        outputs.schedule_coil(coil::FLASHER_CURSED_EARTH, Schedule(0x0003_3333), 0, true);
        Ok(Flow::Continue)
    }

    fn left_ramp_exit(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("left_ramp");
        cx.score(2_000);
        Ok(Flow::Continue)
    }

    fn right_ramp_exit(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("right_ramp");
        cx.outputs()
            .schedule_coil(coil::FLASHERS_RT_RAMP, Schedule(0x0003_3333), 0, true);
        cx.score(2_000);
        Ok(Flow::Continue)
    }

    fn sling(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("sling");
        cx.score(100);
        Ok(Flow::Continue)
    }

    fn inlane(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("inlane");
        Ok(Flow::Continue)
    }

    fn outlane(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.score(1_000);
        let now = cx.now();
        let protected = cx.service::<Trough>()?.balls_in_play() > 1
            || cx.service::<BallSaver>()?.is_active(now);
        if protected {
            cx.outputs().play_sound("outlane");
        } else {
            cx.outputs().play_voice("curse");
        }
        Ok(Flow::Continue)
    }

    fn left_popper(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        flash_then_pop(cx, coil::FLASHERS_LOWER_LEFT, coil::POPPER_L, 50);
        Ok(Flow::Continue)
    }

    fn extra_ball_target(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("extra_ball_target");
        let extra: ExtraBallState = cx.player_state();
        if extra.lit == 0 {
            return Ok(Flow::Continue);
        }
        cx.update_player_state(|extra: &mut ExtraBallState| {
            extra.lit -= 1;
            extra.total += 1;
        })?;
        let waiting = cx.game_mut().award_extra_ball()?;
        log::info!("Extra ball collected ({} waiting)", waiting);
        Self::update_lamps(cx);
        self.show_on_display(Some("Extra Ball"), None);
        Ok(Flow::Continue)
    }

    fn start_button(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if cx.game().ball() == 1 {
            match cx.add_player() {
                Ok(index) => log::info!("Player {} joined", index + 1),
                Err(err) => log::debug!("Start ignored: {}", err),
            }
        }
        Ok(Flow::Continue)
    }

    fn ball_saved(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_voice("ball saved");
        self.show_on_display(Some("Ball Saved!"), None);
        Ok(Flow::Continue)
    }

    fn last_ball_drained(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.finish_ball(cx)?;
        Ok(Flow::Continue)
    }

    fn bonus_finished(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        Self::update_lamps(cx);
        cx.outputs().enable_flippers(true);
        cx.end_ball()?;
        Ok(Flow::Continue)
    }

    fn light_extra_ball_event(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.light_extra_ball(cx)?;
        Ok(Flow::Continue)
    }

    fn inc_bonus_x(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let x = cx.update_player_state(|multiplier: &mut BonusMultiplier| {
            multiplier.x += 1;
            multiplier.x
        })?;
        self.show_on_display(Some(&format!("Bonus at {}X", x)), None);
        Ok(Flow::Continue)
    }

    fn hold_bonus_x(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.update_player_state(|multiplier: &mut BonusMultiplier| multiplier.hold = true)?;
        self.show_on_display(Some("Hold Bonus X"), None);
        Ok(Flow::Continue)
    }

    fn start_challenge(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let rules = Self::rules(cx)?;
        cx.remove_mode(rules.skill_shot)?;
        cx.add_mode(rules.challenge)?;
        Self::update_lamps(cx);
        Ok(Flow::Continue)
    }

    fn challenge_finished(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let rules = Self::rules(cx)?;
        cx.remove_mode(rules.challenge)?;
        cx.outputs().play_music("background", -1);
        Self::update_lamps(cx);
        Ok(Flow::Continue)
    }
}

impl Mode for BasePlay {
    fn handlers(&self) -> HandlerTable<Self> {
        let table = HandlerTable::new()
            .on("sw_flipperLwL_active", Self::flipper_pressed)
            .on("sw_flipperLwR_active", Self::flipper_pressed)
            .on("sw_flipperLwL_inactive", Self::flipper_released)
            .on("sw_flipperLwR_inactive", Self::flipper_released)
            .on("sw_fireR_active", Self::fire_right)
            .on("sw_shooterR_inactive_for_300ms", Self::ball_launched)
            .on("sw_shooterR_inactive_for_1s", Self::ball_plunged)
            .on("sw_shooterR_active", Self::shooter_lane_entered)
            .on("sw_shooterR_active_for_700ms", Self::shooter_lane_resting)
            .on("sw_shooterL_active_for_500ms", Self::left_shooter_held)
            .on("sw_shooterL_inactive_for_200ms", Self::left_shooter_launched)
            .on("sw_subwayEnter2_active", Self::subway)
            .on("sw_leftRampEnter_active", Self::left_ramp_enter)
            .on("sw_leftRampExit_active", Self::left_ramp_exit)
            .on("sw_rightRampExit_active", Self::right_ramp_exit)
            .on("sw_slingL_active", Self::sling)
            .on("sw_slingR_active", Self::sling)
            .on("sw_inlaneL_active", Self::inlane)
            .on("sw_inlaneR_active", Self::inlane)
            .on("sw_inlaneFarR_active", Self::inlane)
            .on("sw_outlaneL_active", Self::outlane)
            .on("sw_outlaneR_active", Self::outlane)
            .on("sw_popperL_active_for_200ms", Self::left_popper)
            .on("sw_leftScorePost_active", Self::extra_ball_target)
            .on("sw_rightTopPost_active", Self::extra_ball_target)
            .on("sw_startButton_active", Self::start_button)
            .on_event(BALL_SAVED, Self::ball_saved)
            .on_event(LAST_BALL_DRAINED, Self::last_ball_drained)
            .on_event(BONUS_FINISHED, Self::bonus_finished)
            .on_event(LIGHT_EXTRA_BALL, Self::light_extra_ball_event)
            .on_event(INC_BONUS_X, Self::inc_bonus_x)
            .on_event(HOLD_BONUS_X, Self::hold_bonus_x)
            .on_event(START_CHALLENGE, Self::start_challenge)
            .on_event(CHALLENGE_FINISHED, Self::challenge_finished);
        // The D target belongs to the subway
        sw::DROP_TARGETS
            .iter()
            .filter(|target| **target != sw::DROP_TARGET_D)
            .fold(table, |table, target| {
                table.on_switch(target, SwitchState::Active, Self::drop_target)
            })
    }

    fn wiring(&self) -> Wiring {
        Wiring::new()
            .switches(&[sw::SHOOTER_R, sw::SHOOTER_L, sw::POPPER_L])
            .coils(&[
                coil::SHOOTER_R,
                coil::SHOOTER_L,
                coil::POPPER_L,
                coil::GLOBE_MOTOR,
                coil::FLASHER_PURSUIT_L,
                coil::FLASHER_PURSUIT_R,
                coil::FLASHER_GLOBE,
                coil::FLASHER_CURSED_EARTH,
                coil::FLASHERS_RT_RAMP,
                coil::FLASHERS_LOWER_LEFT,
            ])
            .lamps(&lamp::GI)
            .lamps(&[lamp::JUDGE_AGAIN, lamp::EXTRA_BALL])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let rules = Self::rules(cx)?;
        cx.update_player_state(|multiplier: &mut BonusMultiplier| {
            if !multiplier.hold {
                multiplier.x = 1;
            }
            multiplier.hold = false;
        })?;
        cx.set_player_state(BonusCounters::default())?;

        let outputs = cx.outputs();
        outputs.schedule_coil(coil::FLASHER_PURSUIT_L, Schedule(0x0000_1010), 1, false);
        outputs.schedule_coil(coil::FLASHER_PURSUIT_R, Schedule(0x0000_0101), 1, false);

        cx.service::<Trough>()?.launch_balls(1);
        let now = cx.now();
        let save_secs = cx.config().gameplay.ball_save_secs;
        cx.service::<BallSaver>()?
            .start(BallSaveRequest::new(1, save_secs).held(), now);

        self.ball_starting = true;
        self.skill_shot_added = false;
        self.auto_plunge = false;
        self.show_on_display(None, None);

        cx.add_mode(rules.ball_search)?;
        cx.outputs().enable_flippers(true);

        Self::update_lamps(cx);

        // The challenge intro darkens the GI, so it goes last
        let default = cx.service::<GameOptions>()?.supergame;
        let supergame: Supergame = cx.player_state();
        if supergame.0.unwrap_or(default) {
            log::info!("Supergame: straight to the Ultimate Challenge");
            cx.add_mode(rules.challenge)?;
        }
        Ok(())
    }

    fn mode_stopped(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let rules = Self::rules(cx)?;
        cx.remove_mode(rules.skill_shot)?;
        cx.remove_mode(rules.ball_search)?;
        cx.remove_mode(rules.challenge)?;
        cx.service::<BallSaver>()?.disable();
        let outputs = cx.outputs();
        outputs.enable_flippers(false);
        outputs.disable_coil(coil::FLASHER_PURSUIT_L);
        outputs.disable_coil(coil::FLASHER_PURSUIT_R);
        outputs.disable_lamp(lamp::EXTRA_BALL);
        Ok(())
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        Some(&mut self.layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(mode: &mut BasePlay) -> Vec<Option<String>> {
        let group = mode.layer.as_grouped_mut().unwrap();
        group
            .layers
            .iter_mut()
            .map(|layer| layer.as_text_mut().unwrap().text().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_display_text_alone_is_large() {
        let mut mode = BasePlay::new();
        mode.show_on_display(Some("Ball Saved!"), None);
        assert_eq!(texts(&mut mode), [Some("Ball Saved!".into()), None, None]);
    }

    #[test]
    fn test_display_text_over_points() {
        let mut mode = BasePlay::new();
        mode.show_on_display(Some("Extra Ball"), Some(25_000));
        assert_eq!(
            texts(&mut mode),
            [None, Some("Extra Ball".into()), Some("25,000".into())]
        );
    }
}
