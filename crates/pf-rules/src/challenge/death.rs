//! Stage 4: Judge Death. Five lit crimescene shots against a 180 s clock.
//! A 10 s shot timer runs alongside; each hit adds 10 s to it, and when it
//! runs dry a shot re-lights.

use pf_core::{PfResult, Schedule};
use pf_dmd::Layer;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};

use super::{SHOT_POINTS, Stage, StageCard};
use crate::playfield::{coil, lamp, sw};
use crate::{BallSaveRequest, BallSaver, Trough};

pub const TOTAL_SECS: u32 = 180;
pub const SHOT_SECS: u32 = 10;
pub const BALL_SAVE_SECS: f64 = 20.0;

/// Shots re-light in this order
pub const SHOT_ORDER: [usize; 5] = [4, 2, 0, 3, 1];

const COUNTDOWN: &str = "countdown";

#[derive(Debug, Default)]
pub struct Death {
    active_shots: [bool; 5],
    total_timer: u32,
    timer: u32,
    card: StageCard,
}

impl Death {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_shots(&self) -> [bool; 5] {
        self.active_shots
    }

    #[inline]
    pub fn total_timer(&self) -> u32 {
        self.total_timer
    }

    #[inline]
    pub fn timer(&self) -> u32 {
        self.timer
    }

    fn update_lamps(&self, cx: &mut ModeCx<'_, Self>) {
        for (shot, active) in self.active_shots.iter().enumerate() {
            for name in lamp::perp_lamps(shot + 1) {
                if *active {
                    cx.outputs().schedule_lamp(&name, Schedule(0x0f0f_0f0f), 0, true);
                } else {
                    cx.outputs().disable_lamp(&name);
                }
            }
        }
    }

    /// Light the first dark shot in [`SHOT_ORDER`]
    fn add_shot(&mut self) {
        if let Some(shot) = SHOT_ORDER.into_iter().find(|shot| !self.active_shots[*shot]) {
            self.active_shots[shot] = true;
        }
    }

    fn countdown(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        if self.total_timer == 0 {
            return self.finish(cx, false);
        }
        if self.timer > 0 {
            self.timer -= 1;
            self.total_timer -= 1;
        } else {
            self.add_shot();
            self.update_lamps(cx);
            self.timer = SHOT_SECS;
        }
        cx.delay(COUNTDOWN, 1.0, |mode, cx| mode.countdown(cx));
        Ok(())
    }

    fn finish(&mut self, cx: &mut ModeCx<'_, Self>, success: bool) -> PfResult<()> {
        cx.cancel_delayed(COUNTDOWN);
        cx.outputs().disable_coil(coil::FLASHER_DEATH);
        self.active_shots = [false; 5];
        self.update_lamps(cx);
        if success {
            super::judge_defeated(cx, &mut self.card, Stage::Death)
        } else {
            super::stage_failed(cx, &mut self.card, Stage::Death);
            Ok(())
        }
    }

    fn hit(&mut self, cx: &mut ModeCx<'_, Self>, shot: usize) -> PfResult<()> {
        if self.card.is_over() || !std::mem::take(&mut self.active_shots[shot]) {
            return Ok(());
        }
        cx.score(SHOT_POINTS);
        cx.outputs().play_sound("shot_hit");
        self.timer += SHOT_SECS;
        self.update_lamps(cx);
        if !self.active_shots.iter().any(|active| *active) {
            self.finish(cx, true)?;
        }
        Ok(())
    }

    // ─── handlers ───

    fn mystery(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.hit(cx, 0)?;
        Ok(Flow::Continue)
    }

    fn top_right_opto(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let now = cx.now();
        if cx.switches().changed_within(sw::LEFT_ROLLOVER, 1_000, now) {
            self.hit(cx, 0)?;
        } else if cx.switches().changed_within(sw::TOP_CENTER_ROLLOVER, 1_500, now) {
            self.hit(cx, 1)?;
        }
        Ok(Flow::Continue)
    }

    fn popper(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.hit(cx, 2)?;
        Ok(Flow::Continue)
    }

    fn left_rollover(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if cx.switches().changed_within(sw::TOP_RIGHT_OPTO, 1_500, cx.now()) {
            self.hit(cx, 3)?;
        }
        Ok(Flow::Continue)
    }

    fn right_ramp(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.hit(cx, 4)?;
        Ok(Flow::Continue)
    }
}

impl Mode for Death {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_mystery_active", Self::mystery)
            .on("sw_topRightOpto_active", Self::top_right_opto)
            .on("sw_popperR_active_for_300ms", Self::popper)
            .on("sw_leftRollover_active", Self::left_rollover)
            .on("sw_rightRampExit_active", Self::right_ramp)
    }

    fn wiring(&self) -> Wiring {
        let perp: Vec<String> = (1..=5).flat_map(lamp::perp_lamps).collect();
        let perp: Vec<&str> = perp.iter().map(String::as_str).collect();
        Wiring::new()
            .switches(&[sw::MYSTERY, sw::TOP_RIGHT_OPTO, sw::POPPER_R, sw::LEFT_ROLLOVER])
            .lamps(&perp)
            .coils(&[coil::FLASHER_DEATH, coil::RESET_DROP_TARGET])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.active_shots = [true; 5];
        self.total_timer = TOTAL_SECS;
        self.timer = SHOT_SECS;
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
            .schedule_coil(coil::FLASHER_DEATH, Schedule(0x8080_8080), 0, true);
        cx.outputs().pulse(coil::RESET_DROP_TARGET, 40);
        cx.delay(COUNTDOWN, 1.0, |mode, cx| mode.countdown(cx));
        super::start_taunts(cx, "death - taunt");
        Ok(())
    }

    fn mode_stopped(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.active_shots = [false; 5];
        self.update_lamps(cx);
        cx.outputs().disable_coil(coil::FLASHER_DEATH);
        Ok(())
    }

    fn mode_tick(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let score = super::player_score(cx);
        self.card
            .update(Stage::Death.name(), score, Some(self.total_timer));
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
    fn test_shots_relight_in_order() {
        let mut death = Death::new();
        death.add_shot();
        assert_eq!(death.active_shots, [false, false, false, false, true]);
        death.add_shot();
        death.add_shot();
        assert_eq!(death.active_shots, [true, false, true, false, true]);
        death.add_shot();
        death.add_shot();
        death.add_shot();
        assert_eq!(death.active_shots, [true; 5]);
    }
}
