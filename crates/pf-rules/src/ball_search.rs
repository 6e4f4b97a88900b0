//! Ball search
//!
//! Counts down while nothing happens on the playfield. Any playfield switch
//! restarts the countdown; a ball resting in a shooter lane or popper stops
//! it. On expiry every search coil is pulsed in turn and the countdown is
//! re-armed, shorter after the first round. Later rounds also cycle the drop
//! target coils, and rounds 10 and 20 feed a replacement ball.

use pf_core::{PfResult, Timestamp};
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};

use crate::Trough;
use crate::playfield::{coil, sw};

/// Seconds between two coils of one search round
pub const COIL_SPACING_SECS: f64 = 0.15;

/// Rounds that launch a replacement ball
pub const REPLACEMENT_ROUNDS: [u32; 2] = [10, 20];

/// A popper opto shorter than this is the ball cup rising, not a ball
const POPPER_BALL_MS: u64 = 190;

const COUNTDOWN: &str = "countdown";

#[derive(Debug, Default)]
pub struct BallSearchMode {
    round: u32,
    countdown_secs: f64,
    popper_l_since: Option<Timestamp>,
    popper_r_since: Option<Timestamp>,
}

impl BallSearchMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search rounds since the last playfield activity
    #[inline]
    pub fn round(&self) -> u32 {
        self.round
    }

    fn popper_since(&mut self, switch: Option<&str>) -> Option<&mut Option<Timestamp>> {
        match switch? {
            sw::POPPER_L => Some(&mut self.popper_l_since),
            sw::POPPER_R => Some(&mut self.popper_r_since),
            _ => None,
        }
    }

    fn arm(cx: &mut ModeCx<'_, Self>, seconds: f64) {
        cx.delay(COUNTDOWN, seconds, |mode, cx| mode.search(cx));
    }

    fn restart(&mut self, cx: &mut ModeCx<'_, Self>) {
        self.round = 0;
        self.countdown_secs = cx.config().gameplay.ball_search_secs;
        Self::arm(cx, self.countdown_secs);
    }

    fn halt(&mut self, cx: &mut ModeCx<'_, Self>) {
        cx.cancel_delayed(COUNTDOWN);
        for name in coil::SEARCH {
            cx.cancel_delayed(name);
        }
    }

    fn search(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.round += 1;
        log::info!("Ball search round {}", self.round);

        if self.round >= 3 {
            if self.round % 2 == 1 {
                cx.outputs().pulse_default(coil::RESET_DROP_TARGET);
            } else {
                cx.outputs().pulse_default(coil::TRIP_DROP_TARGET);
            }
        }
        if self.round == 1 {
            self.countdown_secs = cx.config().gameplay.ball_search_retry_secs;
        }
        if REPLACEMENT_ROUNDS.contains(&self.round) {
            log::warn!("Ball still missing after {} rounds, launching a replacement", self.round);
            cx.service::<Trough>()?.launch_stealth(1);
        }

        for (i, name) in coil::SEARCH.into_iter().enumerate() {
            if i == 0 {
                cx.outputs().pulse_default(name);
                continue;
            }
            cx.delay(name, i as f64 * COIL_SPACING_SECS, move |_, cx| {
                cx.outputs().pulse_default(name);
                Ok(())
            });
        }
        let sequence = coil::SEARCH.len() as f64 * COIL_SPACING_SECS;
        Self::arm(cx, self.countdown_secs + sequence);
        Ok(())
    }

    // ─── switch handlers ───

    fn activity(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.restart(cx);
        Ok(Flow::Continue)
    }

    fn ball_resting(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.halt(cx);
        Ok(Flow::Continue)
    }

    fn popper_active(&mut self, _cx: &mut ModeCx<'_, Self>, event: &Event) -> HandlerResult {
        if let Some(since) = self.popper_since(event.key.switch_name()) {
            *since = Some(event.timestamp);
        }
        Ok(Flow::Continue)
    }

    fn popper_inactive(&mut self, cx: &mut ModeCx<'_, Self>, event: &Event) -> HandlerResult {
        let held = self
            .popper_since(event.key.switch_name())
            .and_then(Option::take)
            .map(|since| event.timestamp.since(since));
        if held.is_some_and(|ms| ms > POPPER_BALL_MS) {
            self.restart(cx);
        }
        Ok(Flow::Continue)
    }
}

impl Mode for BallSearchMode {
    fn handlers(&self) -> HandlerTable<Self> {
        let table = sw::PLAYFIELD
            .iter()
            .fold(HandlerTable::new(), |table, name| {
                table.on(&format!("sw_{}_active", name), Self::activity)
            });
        [sw::SHOOTER_L, sw::SHOOTER_R]
            .iter()
            .fold(table, |table, name| {
                table
                    .on(&format!("sw_{}_active", name), Self::ball_resting)
                    .on(&format!("sw_{}_inactive", name), Self::activity)
            })
            .on("sw_popperL_active", Self::popper_active)
            .on("sw_popperL_active_for_200ms", Self::ball_resting)
            .on("sw_popperL_inactive", Self::popper_inactive)
            .on("sw_popperR_active", Self::popper_active)
            .on("sw_popperR_active_for_200ms", Self::ball_resting)
            .on("sw_popperR_inactive", Self::popper_inactive)
    }

    fn wiring(&self) -> Wiring {
        Wiring::new()
            .coils(&coil::SEARCH)
            .coils(&[coil::RESET_DROP_TARGET, coil::TRIP_DROP_TARGET])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.popper_l_since = None;
        self.popper_r_since = None;
        self.restart(cx);
        Ok(())
    }
}
