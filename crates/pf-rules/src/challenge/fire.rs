//! Stage 1: Judge Fire. Four ball multiball; every crimescene shot is lit
//! once and the mystery hole adds two more balls the first time.

use pf_core::{LampStyle, PfResult, Schedule, SwitchState};
use pf_dmd::Layer;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};

use super::{SHOT_POINTS, Stage, StageCard};
use crate::playfield::{coil, lamp, sw};
use crate::{StatusBoard, Trough};

pub const EXTRA_BALLS: u32 = 3;
pub const MYSTERY_BALLS: u32 = 2;

#[derive(Debug, Default)]
pub struct Fire {
    /// Lit state of the five crimescene shots
    targets: [bool; 5],
    mystery_lit: bool,
    card: StageCard,
}

impl Fire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets_lit(&self) -> usize {
        self.targets.iter().filter(|lit| **lit).count()
    }

    fn update_lamps(&self, cx: &mut ModeCx<'_, Self>) {
        let outputs = cx.outputs();
        for (shot, lit) in self.targets.iter().enumerate() {
            let style = if *lit { LampStyle::Medium } else { LampStyle::Off };
            for name in lamp::perp_lamps(shot + 1) {
                outputs.drive_lamp(&name, style);
            }
        }
        let style = if self.mystery_lit { LampStyle::On } else { LampStyle::Off };
        outputs.drive_lamp(lamp::MYSTERY, style);
    }

    fn hit(&mut self, cx: &mut ModeCx<'_, Self>, shot: usize) -> PfResult<()> {
        if !std::mem::take(&mut self.targets[shot]) {
            return Ok(());
        }
        cx.score(SHOT_POINTS);
        cx.outputs().play_sound("shot_hit");
        self.update_lamps(cx);
        if self.targets_lit() == 0 {
            cx.outputs().disable_coil(coil::FLASHER_FIRE);
            super::judge_defeated(cx, &mut self.card, Stage::Fire)?;
        }
        Ok(())
    }

    // ─── handlers ───

    fn mystery(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().play_sound("mystery");
        if std::mem::take(&mut self.mystery_lit) {
            cx.service::<StatusBoard>()?.post("Add 2 balls!");
            cx.service::<Trough>()?.launch_balls(MYSTERY_BALLS);
            self.update_lamps(cx);
        }
        Ok(Flow::Continue)
    }

    fn top_right_opto(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let now = cx.now();
        // Outer left loop, else inner left loop
        if cx.switches().changed_within(sw::LEFT_ROLLOVER, 1_000, now) {
            self.hit(cx, 0)?;
        } else if cx.switches().changed_within(sw::TOP_CENTER_ROLLOVER, 1_000, now) {
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

    fn top_center_rollover(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if cx.switches().changed_within(sw::TOP_RIGHT_OPTO, 2_000, cx.now()) {
            self.hit(cx, 3)?;
        }
        Ok(Flow::Continue)
    }

    fn right_ramp(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.hit(cx, 4)?;
        Ok(Flow::Continue)
    }

    fn reset_drops(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.outputs().pulse(coil::RESET_DROP_TARGET, 40);
        Ok(Flow::Continue)
    }
}

impl Mode for Fire {
    fn handlers(&self) -> HandlerTable<Self> {
        let table = HandlerTable::new()
            .on("sw_mystery_active", Self::mystery)
            .on("sw_topRightOpto_active", Self::top_right_opto)
            .on("sw_popperR_active_for_300ms", Self::popper)
            .on("sw_leftRollover_active", Self::left_rollover)
            .on("sw_topCenterRollover_active", Self::top_center_rollover)
            .on("sw_rightRampExit_active", Self::right_ramp);
        sw::DROP_TARGETS.iter().fold(table, |table, target| {
            table.on_held(target, SwitchState::Active, 250, Self::reset_drops)
        })
    }

    fn wiring(&self) -> Wiring {
        let perp: Vec<String> = (1..=5).flat_map(lamp::perp_lamps).collect();
        let perp: Vec<&str> = perp.iter().map(String::as_str).collect();
        Wiring::new()
            .switches(&[sw::MYSTERY, sw::TOP_RIGHT_OPTO, sw::POPPER_R, sw::RIGHT_RAMP_EXIT])
            .lamps(&perp)
            .lamps(&[lamp::MYSTERY])
            .coils(&[coil::FLASHER_FIRE, coil::RESET_DROP_TARGET])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.targets = [true; 5];
        self.mystery_lit = true;
        self.card.reset();
        cx.outputs()
            .schedule_coil(coil::FLASHER_FIRE, Schedule(0x8080_8080), 0, true);
        self.update_lamps(cx);
        cx.service::<Trough>()?.launch_balls(EXTRA_BALLS);
        super::start_taunts(cx, "fire - taunt");
        Ok(())
    }

    fn mode_stopped(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.targets = [false; 5];
        self.mystery_lit = false;
        self.update_lamps(cx);
        cx.outputs().disable_coil(coil::FLASHER_FIRE);
        Ok(())
    }

    fn mode_tick(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let score = super::player_score(cx);
        self.card.update(Stage::Fire.name(), score, None);
        Ok(())
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        self.card.layer()
    }
}
