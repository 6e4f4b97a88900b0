//! Skill shot
//!
//! Added when a ball reaches the shooter lane. Once the ball is plunged the
//! player has a few seconds to send it around the right loop; every hit
//! scores 5000 times the number of hits so far and re-opens a shorter window.

use pf_core::{PfResult, Schedule};
use pf_dmd::{GroupedLayer, Layer};
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};

use crate::display::{self, DMD_HEIGHT, DMD_WIDTH};
use crate::playfield::{lamp, sw};
use crate::{BALL_SAVED, BALL_STARTED};

pub const POINTS_PER_HIT: u64 = 5_000;

/// Window re-opened after each award
pub const REARM_SECS: f64 = 3.0;

/// The ball must come around the loop this quickly
const LOOP_MS: u64 = 1_000;

const SHOT_LAMP: usize = 4;
const EXPIRE: &str = "expire";

#[derive(Debug)]
pub struct SkillShotMode {
    shots_hit: u32,
    layer: Layer,
}

impl Default for SkillShotMode {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillShotMode {
    pub fn new() -> Self {
        let caption = display::centered_text(display::small_font(), 7);
        let award = display::centered_text(display::large_font(), 17);
        Self {
            shots_hit: 0,
            layer: Layer::grouped(GroupedLayer::new(
                DMD_WIDTH,
                DMD_HEIGHT,
                vec![Layer::text(caption), Layer::text(award)],
            )),
        }
    }

    #[inline]
    pub fn shots_hit(&self) -> u32 {
        self.shots_hit
    }

    fn blink_lamps(cx: &mut ModeCx<'_, Self>) {
        for name in lamp::perp_lamps(SHOT_LAMP) {
            cx.outputs().schedule_lamp(&name, Schedule(0x00ff_00ff), 0, true);
        }
    }

    /// Caption and points of an award, or blank with `None`
    fn show_award(&mut self, points: Option<u64>) {
        let Some(group) = self.layer.as_grouped_mut() else {
            return;
        };
        let text = [
            points.map(|_| "Skill Shot!".to_string()),
            points.map(display::format_points),
        ];
        for (layer, text) in group.layers.iter_mut().zip(text) {
            if let Some(layer) = layer.as_text_mut() {
                layer.set_text(text.as_deref(), Some(REARM_SECS));
            }
        }
    }

    fn expire(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.cancel_delayed(EXPIRE);
        for name in lamp::perp_lamps(SHOT_LAMP) {
            cx.outputs().disable_lamp(&name);
        }
        log::debug!("Skill shot over after {} hit(s)", self.shots_hit);
        cx.remove_self()?;
        Ok(())
    }

    fn open_window(cx: &mut ModeCx<'_, Self>, seconds: f64) {
        cx.delay(EXPIRE, seconds, |mode, cx| mode.expire(cx));
    }

    // ─── handlers ───

    fn ball_started(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let seconds = cx.config().gameplay.skill_shot_secs;
        Self::open_window(cx, seconds);
        Self::blink_lamps(cx);
        Ok(Flow::Continue)
    }

    fn ball_saved(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.expire(cx)?;
        Ok(Flow::Continue)
    }

    fn loop_made(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let now = cx.now();
        if !cx.switches().changed_within(sw::TOP_RIGHT_OPTO, LOOP_MS, now) {
            return Ok(Flow::Continue);
        }
        self.shots_hit += 1;
        let points = POINTS_PER_HIT * u64::from(self.shots_hit);
        log::info!("Skill shot #{} for {}", self.shots_hit, points);
        cx.score(points);
        cx.outputs().play_voice("good shot");
        self.show_award(Some(points));
        Self::open_window(cx, REARM_SECS);
        Self::blink_lamps(cx);
        Ok(Flow::Continue)
    }
}

impl Mode for SkillShotMode {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_leftRollover_active", Self::loop_made)
            .on_event(BALL_STARTED, Self::ball_started)
            .on_event(BALL_SAVED, Self::ball_saved)
    }

    fn wiring(&self) -> Wiring {
        let lamps = lamp::perp_lamps(SHOT_LAMP);
        let lamps: Vec<&str> = lamps.iter().map(String::as_str).collect();
        Wiring::new().lamps(&lamps).switches(&[sw::TOP_RIGHT_OPTO])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.shots_hit = 0;
        self.show_award(None);
        Self::blink_lamps(cx);
        Ok(())
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        Some(&mut self.layer)
    }
}
