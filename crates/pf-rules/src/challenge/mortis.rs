//! Stage 2: Judge Mortis. Two ball multiball with a temporary ball save;
//! each of five shots must be made twice.

use pf_core::{PfResult, Schedule};
use pf_dmd::Layer;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};

use super::{SHOT_POINTS, Stage, StageCard};
use crate::playfield::{coil, lamp, sw};
use crate::{BallSaveRequest, BallSaver, Trough};

pub const HITS_PER_SHOT: u32 = 2;
pub const BALL_SAVE_SECS: f64 = 20.0;

/// Blink pattern by hits still needed on a shot
fn shot_schedule(remaining: u32) -> Option<Schedule> {
    match remaining {
        0 => None,
        1 => Some(Schedule(0x5555_5555)),
        _ => Some(Schedule(0x0f0f_0f0f)),
    }
}

/// Lamps showing each shot: mystery, perp 1, 3 and 5, stop meltdown
fn shot_lamps(shot: usize) -> Vec<String> {
    match shot {
        0 => vec![lamp::MYSTERY.to_string()],
        1 => lamp::perp_lamps(1),
        2 => lamp::perp_lamps(3),
        3 => lamp::perp_lamps(5),
        _ => vec![lamp::STOP_MELTDOWN.to_string()],
    }
}

#[derive(Debug, Default)]
pub struct Mortis {
    shots_required: [u32; 5],
    card: StageCard,
}

impl Mortis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits still needed on each shot
    pub fn shots_required(&self) -> [u32; 5] {
        self.shots_required
    }

    fn update_lamps(&self, cx: &mut ModeCx<'_, Self>) {
        for (shot, remaining) in self.shots_required.iter().enumerate() {
            for name in shot_lamps(shot) {
                match shot_schedule(*remaining) {
                    Some(schedule) => cx.outputs().schedule_lamp(&name, schedule, 0, true),
                    None => cx.outputs().disable_lamp(&name),
                }
            }
        }
    }

    fn hit(&mut self, cx: &mut ModeCx<'_, Self>, shot: usize) -> PfResult<()> {
        if self.shots_required[shot] == 0 {
            return Ok(());
        }
        self.shots_required[shot] -= 1;
        cx.score(SHOT_POINTS);
        cx.outputs().play_sound("shot_hit");
        self.update_lamps(cx);
        if self.shots_required.iter().all(|remaining| *remaining == 0) {
            cx.outputs().disable_coil(coil::FLASHER_MORTIS);
            super::judge_defeated(cx, &mut self.card, Stage::Mortis)?;
        }
        Ok(())
    }

    // ─── handlers ───

    fn mystery(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.hit(cx, 0)?;
        Ok(Flow::Continue)
    }

    fn top_right_opto(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if cx.switches().changed_within(sw::LEFT_ROLLOVER, 1_000, cx.now()) {
            self.hit(cx, 1)?;
        }
        Ok(Flow::Continue)
    }

    fn popper(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.hit(cx, 2)?;
        Ok(Flow::Continue)
    }

    fn right_ramp(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.hit(cx, 3)?;
        Ok(Flow::Continue)
    }

    fn captive_ball(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.hit(cx, 4)?;
        Ok(Flow::Continue)
    }
}

impl Mode for Mortis {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_mystery_active", Self::mystery)
            .on("sw_topRightOpto_active", Self::top_right_opto)
            .on("sw_popperR_active_for_300ms", Self::popper)
            .on("sw_rightRampExit_active", Self::right_ramp)
            .on("sw_captiveBall3_active", Self::captive_ball)
    }

    fn wiring(&self) -> Wiring {
        let lamps: Vec<String> = (0..5).flat_map(shot_lamps).collect();
        let lamps: Vec<&str> = lamps.iter().map(String::as_str).collect();
        Wiring::new()
            .switches(&[sw::MYSTERY, sw::TOP_RIGHT_OPTO, sw::POPPER_R, sw::CAPTIVE_BALL_3])
            .lamps(&lamps)
            .coils(&[coil::FLASHER_MORTIS])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.shots_required = [HITS_PER_SHOT; 5];
        self.card.reset();
        self.update_lamps(cx);

        // The ball waiting in the right popper is one of the two
        let launch = if cx.switches().is_active(sw::POPPER_R) { 1 } else { 2 };
        cx.service::<Trough>()?.launch_balls(launch);
        let now = cx.now();
        cx.service::<BallSaver>()?.start(
            BallSaveRequest::new(2, BALL_SAVE_SECS).held().multiple(),
            now,
        );
        cx.outputs()
            .schedule_coil(coil::FLASHER_MORTIS, Schedule(0x8080_8080), 0, true);
        super::start_taunts(cx, "mortis - taunt");
        Ok(())
    }

    fn mode_stopped(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.shots_required = [0; 5];
        self.update_lamps(cx);
        cx.outputs().disable_coil(coil::FLASHER_MORTIS);
        Ok(())
    }

    fn mode_tick(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let score = super::player_score(cx);
        self.card.update(Stage::Mortis.name(), score, None);
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
    fn test_blink_speeds_up_on_last_hit() {
        assert_eq!(shot_schedule(2), Some(Schedule(0x0f0f_0f0f)));
        assert_eq!(shot_schedule(1), Some(Schedule(0x5555_5555)));
        assert_eq!(shot_schedule(0), None);
    }

    #[test]
    fn test_shot_lamps() {
        assert_eq!(shot_lamps(0), vec!["mystery".to_string()]);
        assert_eq!(shot_lamps(2), lamp::perp_lamps(3));
        assert_eq!(shot_lamps(4), vec!["stopMeltdown".to_string()]);
    }
}
