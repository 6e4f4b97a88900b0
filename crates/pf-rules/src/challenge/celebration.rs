//! Celebration: six ball multiball where every shot scores, under a random
//! lamp show. Complete from the start; the challenge ends it when one ball
//! remains. The player's next ball is regular play.

use pf_core::{PfResult, Schedule};
use pf_dmd::Layer;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};
use rand::seq::SliceRandom;

use super::{Stage, StageCard};
use crate::playfield::{lamp, sw};
use crate::{BallSaveRequest, BallSaver, Supergame, Trough};

pub const BALLS: u32 = 6;
pub const BALL_SAVE_SECS: f64 = 20.0;
pub const LOOP_POINTS: u64 = 5_000;
pub const SHOT_POINTS: u64 = 1_000;

/// Lamps the show leaves alone
const EXCLUDED: [&str; 5] = [
    lamp::START_BUTTON,
    lamp::BUY_IN,
    lamp::DRAIN_SHIELD,
    lamp::SUPER_GAME,
    lamp::JUDGE_AGAIN,
];

/// A 16 bit wide window rotated `step` places through the 32 bit schedule
pub fn chase_schedule(step: u32) -> Schedule {
    let step = step % 32;
    let mut bits = 0xffff_0000u32 >> step;
    if step > 16 {
        bits |= ((0xffffu64 << (32 - (step - 16))) & 0xffff_ffff) as u32;
    }
    Schedule(bits)
}

fn show_lamps(lamps: &[String]) -> Vec<&str> {
    lamps
        .iter()
        .map(String::as_str)
        .filter(|name| !name.starts_with("gi") && !EXCLUDED.contains(name))
        .collect()
}

#[derive(Debug, Default)]
pub struct Celebration {
    card: StageCard,
}

impl Celebration {
    pub fn new() -> Self {
        Self::default()
    }

    fn lamp_show(cx: &mut ModeCx<'_, Self>) {
        let all = cx.config().lamps.clone();
        let mut lamps = show_lamps(&all);
        lamps.shuffle(cx.rng());
        for (step, name) in lamps.into_iter().enumerate() {
            cx.outputs()
                .schedule_lamp(name, chase_schedule(step as u32), 0, true);
        }
    }

    // ─── handlers ───

    fn loop_shot(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.score(LOOP_POINTS);
        Ok(Flow::Continue)
    }

    fn shot(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.score(SHOT_POINTS);
        Ok(Flow::Continue)
    }
}

impl Mode for Celebration {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_mystery_active", Self::loop_shot)
            .on("sw_topRightOpto_active", Self::loop_shot)
            .on("sw_leftRollover_active", Self::loop_shot)
            .on("sw_popperR_active_for_300ms", Self::shot)
            .on("sw_rightRampExit_active", Self::shot)
    }

    fn wiring(&self) -> Wiring {
        Wiring::new().switches(&[
            sw::MYSTERY,
            sw::TOP_RIGHT_OPTO,
            sw::LEFT_ROLLOVER,
            sw::POPPER_R,
            sw::RIGHT_RAMP_EXIT,
        ])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.card.reset();
        // Back to regular play on the next ball
        cx.set_player_state(Supergame(Some(false)))?;

        cx.service::<Trough>()?.launch_balls(BALLS);
        let now = cx.now();
        cx.service::<BallSaver>()?.start(
            BallSaveRequest::new(BALLS, BALL_SAVE_SECS).held().multiple(),
            now,
        );
        Self::lamp_show(cx);
        Ok(())
    }

    fn mode_stopped(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let all = cx.config().lamps.clone();
        for name in show_lamps(&all) {
            cx.outputs().disable_lamp(name);
        }
        for gi in lamp::GI {
            cx.outputs().enable_lamp(gi);
        }
        Ok(())
    }

    fn mode_tick(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let score = super::player_score(cx);
        self.card.update(Stage::Celebration.name(), score, None);
        Ok(())
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        self.card.layer()
    }
}
