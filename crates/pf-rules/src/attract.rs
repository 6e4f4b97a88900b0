//! Attract mode
//!
//! Runs whenever no game is in progress: a looping display script, blinking
//! start buttons and a lamp show that changes every 10 s. The yellow start
//! button starts a regular game, the green one a supergame.

use pf_core::{PfResult, Schedule};
use pf_dmd::{Direction, GroupedLayer, Layer, ScriptEntry, ScriptedLayer, Transition};
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};
use rand::seq::SliceRandom;

use crate::GameOptions;
use crate::display::{self, DMD_HEIGHT, DMD_WIDTH};
use crate::playfield::{lamp, sw};

/// Seconds between two lamp show changes
pub const LAMP_SHOW_SECS: f64 = 10.0;

/// Lamp shows as (name, schedule of odd perp shots, schedule of even ones)
pub const LAMP_SHOWS: [(&str, u32, u32); 2] = [
    ("attract0", 0x0f0f_0f0f, 0xf0f0_f0f0),
    ("attract1", 0x00ff_00ff, 0x0000_ffff),
];

const CREDITS: [&str; 14] = [
    "", "", "CREDITS", "", "RULES", "GERRY STELLENBERG", "", "SOFTWARE", "ADAM PREBLE",
    "MICHAEL OCEAN", "JOSH KUGLER", "CLEMENT PELLERIN", "", "DOTS TRAVIS HIGHRISE",
];

const INSTRUCTIONS: [&str; 18] = [
    "", "", "INSTRUCTIONS", "", "START CHAIN FEATURES", "BY SHOOTING", "BUILD UP CHAIN FEATURE",
    "WHEN LIT", "", "SECURE BLOCKS BY SHOOTING", "LIT CRIME SCENE SHOTS", "",
    "COMPLETE JUDGE TARGETS", "TO LIGHT LOCKS", "", "TO LIGHT ULTIMATE CHALLENGE:",
    "START ALL CHAIN FEATURES", "SECURE ALL BLOCKS",
];

fn headline(text: &str) -> Layer {
    let mut layer = display::centered_text(display::large_font(), 7);
    layer.set_text(Some(text), None);
    Layer::grouped(GroupedLayer::new(DMD_WIDTH, DMD_HEIGHT, vec![Layer::text(layer)])).opaque()
}

fn button_card(button: &str, play: &str, blink_frames: u32) -> Layer {
    let lines = [(button, 8), (play, 17)].map(|(text, y)| {
        let mut layer = display::centered_text(display::small_font(), y);
        layer.set_blinking_text(Some(text), None, blink_frames);
        Layer::text(layer)
    });
    Layer::grouped(GroupedLayer::new(DMD_WIDTH, DMD_HEIGHT, lines.into())).opaque()
}

/// The regular attract loop
fn attract_script() -> ScriptedLayer {
    let script = vec![
        ScriptEntry::new(3.0, headline("Judge Dredd"))
            .with_transition(Transition::push(Direction::South)),
        ScriptEntry::new(0.75, button_card("Press Yellow Button", "for Regulation Play", 0))
            .with_transition(Transition::push(Direction::West)),
        ScriptEntry::new(2.0, button_card("Press Yellow Button", "for Regulation Play", 5)),
        ScriptEntry::new(0.75, button_card("Press Green Button", "for SuperGame", 0))
            .with_transition(Transition::push(Direction::West)),
        ScriptEntry::new(2.0, button_card("Press Green Button", "for SuperGame", 5)),
        ScriptEntry::new(6.0, display::panning(&CREDITS, 2)),
    ];
    ScriptedLayer::new(DMD_WIDTH, DMD_HEIGHT, script)
}

fn instructions_script() -> ScriptedLayer {
    ScriptedLayer::new(
        DMD_WIDTH,
        DMD_HEIGHT,
        vec![ScriptEntry::new(22.5, display::panning(&INSTRUCTIONS, 7))],
    )
    .holding()
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct AttractMode {
    layer: Layer,
    showing_instructions: bool,
    lamp_show: Option<&'static str>,
}

impl Default for AttractMode {
    fn default() -> Self {
        Self::new()
    }
}

impl AttractMode {
    pub fn new() -> Self {
        Self {
            layer: Layer::scripted(attract_script()).opaque(),
            showing_instructions: false,
            lamp_show: None,
        }
    }

    /// Name of the running lamp show
    pub fn lamp_show(&self) -> Option<&'static str> {
        self.lamp_show
    }

    pub fn showing_instructions(&self) -> bool {
        self.showing_instructions
    }

    fn show_loop(&mut self) {
        self.showing_instructions = false;
        self.layer = Layer::scripted(attract_script()).opaque();
    }

    fn change_lamp_show(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let mut shows = LAMP_SHOWS;
        shows.shuffle(cx.rng());
        let (name, odd, even) = shows[0];
        log::debug!("Attract lamp show '{}'", name);
        self.lamp_show = Some(name);
        for shot in 1..=5 {
            let schedule = Schedule(if shot % 2 == 1 { odd } else { even });
            for lamp in lamp::perp_lamps(shot) {
                cx.outputs().schedule_lamp(&lamp, schedule, 0, true);
            }
        }
        cx.delay("lamp_show", LAMP_SHOW_SECS, |mode, cx| mode.change_lamp_show(cx));
        Ok(())
    }

    fn stop_lamp_show(&mut self, cx: &mut ModeCx<'_, Self>) {
        self.lamp_show = None;
        for shot in 1..=5 {
            for lamp in lamp::perp_lamps(shot) {
                cx.outputs().disable_lamp(&lamp);
            }
        }
    }

    // ─── handlers ───

    fn step(&mut self, cx: &mut ModeCx<'_, Self>, event: &Event) -> HandlerResult {
        cx.outputs().play_voice("attract");
        let forward = event.key.switch_name() == Some(sw::FIRE_R);
        let now = cx.now();
        if let Some(script) = self.layer.as_scripted_mut() {
            script.force_next(forward, now);
        }
        Ok(Flow::Continue)
    }

    fn instructions(&mut self, _cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if !self.showing_instructions {
            self.showing_instructions = true;
            self.layer = Layer::scripted(instructions_script()).opaque();
        }
        Ok(Flow::Continue)
    }

    fn restart_loop(&mut self, _cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.show_loop();
        Ok(Flow::Continue)
    }

    fn start_regular(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.start(cx, false)
    }

    fn start_supergame(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.start(cx, true)
    }

    fn start(&mut self, cx: &mut ModeCx<'_, Self>, supergame: bool) -> HandlerResult {
        cx.service::<GameOptions>()?.supergame = supergame;
        log::info!("Start pressed ({})", if supergame { "supergame" } else { "regular" });
        cx.start_game()?;
        Ok(Flow::Stop)
    }
}

impl Mode for AttractMode {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_fireL_active", Self::step)
            .on("sw_fireR_active", Self::step)
            .on("sw_flipperLwL_active", Self::instructions)
            .on("sw_flipperLwR_active", Self::restart_loop)
            .on("sw_startButton_active", Self::start_regular)
            .on("sw_superGame_active", Self::start_supergame)
    }

    fn wiring(&self) -> Wiring {
        let perp: Vec<String> = (1..=5).flat_map(lamp::perp_lamps).collect();
        let perp: Vec<&str> = perp.iter().map(String::as_str).collect();
        Wiring::new()
            .lamps(&[lamp::START_BUTTON, lamp::SUPER_GAME])
            .lamps(&lamp::GI)
            .lamps(&perp)
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let outputs = cx.outputs();
        outputs.schedule_lamp(lamp::START_BUTTON, Schedule(0x00ff_00ff), 0, false);
        outputs.schedule_lamp(lamp::SUPER_GAME, Schedule(0xff00_ff00), 0, false);
        for gi in lamp::GI {
            outputs.disable_lamp(gi);
        }
        outputs.enable_lamp(lamp::GI[0]);

        self.show_loop();
        self.change_lamp_show(cx)
    }

    fn mode_stopped(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.outputs().enable_lamp(lamp::START_BUTTON);
        cx.outputs().enable_lamp(lamp::SUPER_GAME);
        self.stop_lamp_show(cx);
        Ok(())
    }

    fn mode_tick(&mut self, _cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let finished = self
            .layer
            .as_scripted_mut()
            .is_some_and(|script| script.is_completed());
        if self.showing_instructions && finished {
            self.show_loop();
        }
        Ok(())
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        Some(&mut self.layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attract_script_loops() {
        let mut script = attract_script();
        assert_eq!(script.len(), 6);
        script.force_next(false, pf_core::Timestamp(0));
        assert_eq!(script.index(), 5);
    }

    #[test]
    fn test_instructions_hold_on_last_entry() {
        let mut script = instructions_script();
        script.next_frame(pf_core::Timestamp(0));
        script.next_frame(pf_core::Timestamp(22_500));
        assert!(script.is_completed());
    }
}
