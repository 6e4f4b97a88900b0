//! Stage 3: Judge Fear. One ball against a 20 s clock: four ramp shots,
//! alternating and starting on the left, then the subway. Every ramp resets
//! the clock, and so does the mystery hole once.

use pf_core::{PfResult, Schedule, SwitchState};
use pf_dmd::Layer;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};

use super::{SHOT_POINTS, Stage, StageCard};
use crate::playfield::{coil, lamp, sw};
use crate::{BallSaveRequest, BallSaver, Trough};

pub const TIMER_SECS: u32 = 20;
pub const RAMP_SHOTS: u32 = 4;
pub const BALL_SAVE_SECS: f64 = 10.0;

const COUNTDOWN: &str = "countdown";

const SUBWAY_LAMPS: [&str; 4] = [
    lamp::PICK_A_PRIZE,
    lamp::AWARD_SAFECRACKER,
    lamp::AWARD_BAD_IMPERSONATOR,
    lamp::MULTIBALL_JACKPOT,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FearState {
    #[default]
    Ramps,
    Subway,
    Finished,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ramp {
    #[default]
    Left,
    Right,
}

impl Ramp {
    fn other(self) -> Ramp {
        match self {
            Ramp::Left => Ramp::Right,
            Ramp::Right => Ramp::Left,
        }
    }
}

#[derive(Debug, Default)]
pub struct Fear {
    state: FearState,
    active_ramp: Ramp,
    ramp_shots_hit: u32,
    timer: u32,
    mystery_lit: bool,
    card: StageCard,
}

impl Fear {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> FearState {
        self.state
    }

    #[inline]
    pub fn active_ramp(&self) -> Ramp {
        self.active_ramp
    }

    #[inline]
    pub fn timer(&self) -> u32 {
        self.timer
    }

    fn update_lamps(&self, cx: &mut ModeCx<'_, Self>) {
        let drop_down = cx.switches().is_inactive(sw::DROP_TARGET_D);
        let outputs = cx.outputs();
        if self.mystery_lit && self.state != FearState::Finished {
            outputs.enable_lamp(lamp::MYSTERY);
        } else {
            outputs.disable_lamp(lamp::MYSTERY);
        }

        let chase = Schedule(0x0003_0003);
        let (left, right) = match (self.state, self.active_ramp) {
            (FearState::Ramps, Ramp::Left) => (Some(chase), None),
            (FearState::Ramps, Ramp::Right) => (None, Some(chase)),
            _ => (None, None),
        };
        for (flasher, schedule) in [(coil::FLASHER_PURSUIT_L, left), (coil::FLASHER_PURSUIT_R, right)] {
            match schedule {
                Some(schedule) => outputs.schedule_coil(flasher, schedule, 0, true),
                None => outputs.disable_coil(flasher),
            }
        }

        let subway = self.state == FearState::Subway;
        for name in SUBWAY_LAMPS {
            if subway {
                outputs.schedule_lamp(name, Schedule(0x0f0f_0f0f), 0, true);
            } else {
                outputs.disable_lamp(name);
            }
        }
        if subway && drop_down {
            outputs.schedule_lamp(lamp::DROP_TARGET_D, Schedule(0x0f0f_0f0f), 0, true);
        } else {
            outputs.disable_lamp(lamp::DROP_TARGET_D);
        }
    }

    fn countdown(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        if self.timer == 0 {
            return self.finish(cx, false);
        }
        self.timer -= 1;
        cx.delay(COUNTDOWN, 1.0, |mode, cx| mode.countdown(cx));
        Ok(())
    }

    fn finish(&mut self, cx: &mut ModeCx<'_, Self>, success: bool) -> PfResult<()> {
        cx.cancel_delayed(COUNTDOWN);
        self.state = FearState::Finished;
        cx.outputs().disable_coil(coil::FLASHER_FEAR);
        self.update_lamps(cx);
        if success {
            super::judge_defeated(cx, &mut self.card, Stage::Fear)
        } else {
            super::stage_failed(cx, &mut self.card, Stage::Fear);
            Ok(())
        }
    }

    fn ramp(&mut self, cx: &mut ModeCx<'_, Self>, ramp: Ramp) {
        if self.state != FearState::Ramps || self.active_ramp != ramp {
            return;
        }
        self.ramp_shots_hit += 1;
        cx.score(SHOT_POINTS);
        cx.outputs().play_sound("shot_hit");
        if self.ramp_shots_hit >= RAMP_SHOTS {
            log::debug!("Fear: subway lit");
            self.state = FearState::Subway;
        } else {
            self.active_ramp = ramp.other();
        }
        self.timer = TIMER_SECS;
        self.update_lamps(cx);
    }

    // ─── handlers ───

    fn left_ramp(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.ramp(cx, Ramp::Left);
        Ok(Flow::Continue)
    }

    fn right_ramp(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.ramp(cx, Ramp::Right);
        Ok(Flow::Continue)
    }

    fn subway(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if self.state == FearState::Subway {
            cx.score(SHOT_POINTS);
            cx.outputs().play_sound("shot_hit");
            self.finish(cx, true)?;
        }
        Ok(Flow::Continue)
    }

    fn mystery(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("mystery");
        if self.mystery_lit && self.state != FearState::Finished {
            self.mystery_lit = false;
            self.timer = TIMER_SECS;
            self.update_lamps(cx);
        }
        Ok(Flow::Continue)
    }

    /// Knock the D target down so the subway is open
    fn drop_target_up(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if self.state == FearState::Subway {
            cx.outputs().pulse(coil::TRIP_DROP_TARGET, 60);
        }
        Ok(Flow::Continue)
    }

    fn drop_target_down(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        match self.state {
            FearState::Ramps => cx.outputs().pulse(coil::RESET_DROP_TARGET, 40),
            _ => self.update_lamps(cx),
        }
        Ok(Flow::Continue)
    }

    /// Swallow popper hits so lower modes don't score them
    fn popper(&mut self, _cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        Ok(Flow::Stop)
    }
}

impl Mode for Fear {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_leftRampExit_active", Self::left_ramp)
            .on("sw_rightRampExit_active", Self::right_ramp)
            .on("sw_subwayEnter1_active", Self::subway)
            .on("sw_subwayEnter2_active", Self::subway)
            .on("sw_mystery_active", Self::mystery)
            .on("sw_popperR_active_for_300ms", Self::popper)
            .on_held(sw::DROP_TARGET_D, SwitchState::Inactive, 400, Self::drop_target_up)
            .on_held(sw::DROP_TARGET_D, SwitchState::Active, 250, Self::drop_target_down)
    }

    fn wiring(&self) -> Wiring {
        Wiring::new()
            .switches(&[
                sw::LEFT_RAMP_EXIT,
                sw::RIGHT_RAMP_EXIT,
                sw::SUBWAY_ENTER_1,
                sw::SUBWAY_ENTER_2,
                sw::DROP_TARGET_D,
            ])
            .lamps(&SUBWAY_LAMPS)
            .lamps(&[lamp::MYSTERY, lamp::DROP_TARGET_D])
            .coils(&[
                coil::FLASHER_FEAR,
                coil::FLASHER_PURSUIT_L,
                coil::FLASHER_PURSUIT_R,
                coil::TRIP_DROP_TARGET,
                coil::RESET_DROP_TARGET,
            ])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.state = FearState::Ramps;
        self.active_ramp = Ramp::Left;
        self.ramp_shots_hit = 0;
        self.timer = TIMER_SECS;
        self.mystery_lit = true;
        self.card.reset();
        self.update_lamps(cx);

        if cx.switches().is_inactive(sw::POPPER_R) {
            cx.service::<Trough>()?.launch_balls(1);
        }
        let now = cx.now();
        cx.service::<BallSaver>()?.start(
            BallSaveRequest::new(1, BALL_SAVE_SECS).held().multiple(),
            now,
        );
        cx.outputs()
            .schedule_coil(coil::FLASHER_FEAR, Schedule(0x8080_8080), 0, true);
        cx.delay(COUNTDOWN, 1.0, |mode, cx| mode.countdown(cx));
        super::start_taunts(cx, "fear - taunt");
        Ok(())
    }

    fn mode_stopped(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.state = FearState::Finished;
        self.mystery_lit = false;
        self.update_lamps(cx);
        cx.outputs().disable_coil(coil::FLASHER_FEAR);
        Ok(())
    }

    fn mode_tick(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let score = super::player_score(cx);
        self.card.update(Stage::Fear.name(), score, Some(self.timer));
        Ok(())
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        self.card.layer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramps_alternate() {
        assert_eq!(Ramp::Left.other(), Ramp::Right);
        assert_eq!(Ramp::Right.other(), Ramp::Left);
        assert_eq!(Fear::new().active_ramp(), Ramp::Left);
    }
}
