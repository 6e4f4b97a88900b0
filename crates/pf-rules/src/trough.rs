//! Trough
//!
//! Counts the balls in play, feeds new balls to the shooter lane one per
//! second and turns outhole drains into rule events:
//!
//! ```text
//! drain ─▶ ball save armed? ── yes ─▶ relaunch, evt_ball_saved
//!                  │ no
//!                  ▼
//!          evt_ball_drained ── Stop ─▶ intentional, nothing else
//!                  │ Continue
//!                  ▼
//!          none left in play? ── yes ─▶ evt_last_ball_drained
//! ```

use pf_core::PfResult;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};

use crate::BallSaver;
use crate::playfield::{coil, sw};

pub const BALL_SAVED: &str = "evt_ball_saved";
pub const BALL_DRAINED: &str = "evt_ball_drained";
pub const LAST_BALL_DRAINED: &str = "evt_last_ball_drained";

/// Seconds between two launches
pub const LAUNCH_INTERVAL_SECS: f64 = 1.0;

/// Ball accounting shared by the rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trough {
    balls_in_play: u32,
    pending_launches: u32,
    /// Replacements for balls already counted in play
    stealth_launches: u32,
    launched: u64,
    drained: u64,
}

impl Trough {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue balls for the shooter lane
    pub fn launch_balls(&mut self, count: u32) {
        self.pending_launches += count;
        log::debug!(
            "Trough: {} ball(s) requested, {} waiting",
            count,
            self.pending_launches
        );
    }

    /// Queue a replacement for a ball believed stuck; the count in play
    /// does not change
    pub fn launch_stealth(&mut self, count: u32) {
        self.stealth_launches += count;
        log::debug!("Trough: {} replacement ball(s) requested", count);
    }

    #[inline]
    pub fn balls_in_play(&self) -> u32 {
        self.balls_in_play
    }

    #[inline]
    pub fn pending_launches(&self) -> u32 {
        self.pending_launches
    }

    /// Balls in play plus balls about to be launched
    pub fn balls_requested(&self) -> u32 {
        self.balls_in_play + self.pending_launches
    }

    pub fn launched(&self) -> u64 {
        self.launched
    }

    pub fn drained(&self) -> u64 {
        self.drained
    }

    fn take_launch(&mut self) -> bool {
        if self.pending_launches > 0 {
            self.pending_launches -= 1;
            self.balls_in_play += 1;
        } else if self.stealth_launches > 0 {
            self.stealth_launches -= 1;
        } else {
            return false;
        }
        self.launched += 1;
        true
    }

    fn ball_drained(&mut self) -> u32 {
        self.balls_in_play = self.balls_in_play.saturating_sub(1);
        self.drained += 1;
        self.balls_in_play
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct TroughMode;

impl TroughMode {
    pub fn new() -> Self {
        Self
    }

    fn drain(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        if !cx.game().is_in_progress() {
            return Ok(Flow::Continue);
        }
        let remaining = cx.service::<Trough>()?.ball_drained();
        let now = cx.now();
        if cx.service::<BallSaver>()?.try_save(now) {
            log::info!("Ball saved");
            cx.service::<Trough>()?.launch_balls(1);
            cx.send_event(BALL_SAVED);
            return Ok(Flow::Continue);
        }

        if cx.send_event(BALL_DRAINED).is_stop() {
            log::debug!("Drain claimed by a mode, {} ball(s) left", remaining);
            return Ok(Flow::Continue);
        }
        // A claiming mode may have launched more balls
        if cx.service::<Trough>()?.balls_requested() == 0 {
            cx.send_event(LAST_BALL_DRAINED);
        }
        Ok(Flow::Continue)
    }
}

impl Mode for TroughMode {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new().on("sw_outhole_active", Self::drain)
    }

    fn wiring(&self) -> Wiring {
        Wiring::new().coils(&[coil::TROUGH]).switches(&[sw::OUTHOLE])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.service::<Trough>()?.reset();
        Ok(())
    }

    fn mode_tick(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        if cx.is_delayed("launch") {
            return Ok(());
        }
        if cx.service::<Trough>()?.take_launch() {
            cx.outputs().pulse_default(coil::TROUGH);
            // Spacing between launches; the callback only marks the gap
            cx.delay("launch", LAUNCH_INTERVAL_SECS, |_, _| Ok(()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_accounting() {
        let mut trough = Trough::new();
        trough.launch_balls(2);
        assert_eq!(trough.balls_requested(), 2);
        assert!(trough.take_launch());
        assert_eq!(trough.balls_in_play(), 1);
        assert_eq!(trough.pending_launches(), 1);
        assert!(trough.take_launch());
        assert!(!trough.take_launch());
        assert_eq!(trough.launched(), 2);
    }

    #[test]
    fn test_stealth_launch_keeps_count() {
        let mut trough = Trough::new();
        trough.launch_balls(1);
        trough.take_launch();
        trough.launch_stealth(1);
        assert_eq!(trough.balls_requested(), 1);
        assert!(trough.take_launch());
        assert_eq!(trough.balls_in_play(), 1);
        assert_eq!(trough.launched(), 2);
    }

    #[test]
    fn test_drain_never_underflows() {
        let mut trough = Trough::new();
        assert_eq!(trough.ball_drained(), 0);
        trough.launch_balls(1);
        trough.take_launch();
        assert_eq!(trough.ball_drained(), 0);
        assert_eq!(trough.drained(), 2);
        trough.reset();
        assert_eq!(trough, Trough::new());
    }
}
