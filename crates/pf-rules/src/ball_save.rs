//! Ball save
//!
//! While a save is armed, a drained ball is relaunched instead of ending the
//! turn. Every request silently gets the configured grace period added on
//! top of the requested time: the drain-shield lamp goes dark when the
//! requested time is up, but drains are still saved through the grace.
//!
//! ```text
//!  start(5s)        lamp off           window closes
//!     │──── requested 5s ────│── grace 2s ──│
//!     └──────── status: Active (7s) ────────┘──▶ GraceExpired
//! ```

use pf_core::{PfResult, Timestamp, secs_to_millis};
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring, events};
use serde::{Deserialize, Serialize};

use crate::playfield::{lamp, sw};

/// Where the save timer stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallSaveStatus {
    /// Nothing armed
    #[default]
    Inactive,
    /// Drains are saved
    Active,
    /// The armed window, grace included, has run out
    GraceExpired,
}

/// A request to protect the balls in play
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSaveRequest {
    /// Drains that may be saved
    pub balls: u32,
    /// Requested protection, grace not included
    pub seconds: f64,
    /// Start counting immediately; otherwise wait for the ball to leave the shooter lane
    pub now: bool,
    pub allow_multiple_saves: bool,
}

impl BallSaveRequest {
    pub fn new(balls: u32, seconds: f64) -> Self {
        Self {
            balls,
            seconds,
            now: true,
            allow_multiple_saves: false,
        }
    }

    /// Hold the countdown until the ball is plunged
    pub fn held(mut self) -> Self {
        self.now = false;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.allow_multiple_saves = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SaveWindow {
    Idle,
    /// Armed, countdown not running yet
    Held { requested_ms: u64 },
    Armed {
        lamp_until: Timestamp,
        expires_at: Timestamp,
    },
    Expired,
}

/// Shared ball-save state
#[derive(Debug, Clone)]
pub struct BallSaver {
    grace_ms: u64,
    window: SaveWindow,
    balls: u32,
    allow_multiple: bool,
    saved: u32,
}

impl BallSaver {
    pub fn new(grace_secs: f64) -> Self {
        Self {
            grace_ms: secs_to_millis(grace_secs),
            window: SaveWindow::Idle,
            balls: 0,
            allow_multiple: false,
            saved: 0,
        }
    }

    #[inline]
    pub fn grace_ms(&self) -> u64 {
        self.grace_ms
    }

    /// Drains saved since the saver was last disabled
    #[inline]
    pub fn saved(&self) -> u32 {
        self.saved
    }

    pub fn balls_remaining(&self) -> u32 {
        self.balls
    }

    /// Arm a save. A request arriving while a save is armed extends it only
    /// when it allows multiple saves; otherwise it is ignored.
    pub fn start(&mut self, request: BallSaveRequest, now: Timestamp) -> bool {
        if request.seconds <= 0.0 || request.balls == 0 {
            return false;
        }
        let requested_ms = secs_to_millis(request.seconds);
        let armed = self.status(now) == BallSaveStatus::Active;
        if armed && !request.allow_multiple_saves {
            log::debug!("Ball save already running, request for {}s ignored", request.seconds);
            return false;
        }

        let window = if request.now {
            self.arm(now, requested_ms)
        } else {
            SaveWindow::Held { requested_ms }
        };
        if armed {
            self.window = extend(self.window, window);
            self.balls += request.balls;
        } else {
            self.window = window;
            self.balls = request.balls;
        }
        self.allow_multiple = request.allow_multiple_saves;
        log::debug!(
            "Ball save for {} ball(s), {}s + {}ms grace{}",
            self.balls,
            request.seconds,
            self.grace_ms,
            if request.now { "" } else { " (held)" }
        );
        true
    }

    fn arm(&self, now: Timestamp, requested_ms: u64) -> SaveWindow {
        SaveWindow::Armed {
            lamp_until: now + requested_ms,
            expires_at: now + requested_ms + self.grace_ms,
        }
    }

    /// Start a held countdown; false if none was waiting
    pub fn release(&mut self, now: Timestamp) -> bool {
        match self.window {
            SaveWindow::Held { requested_ms } => {
                self.window = self.arm(now, requested_ms);
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, now: Timestamp) -> BallSaveStatus {
        match self.window {
            SaveWindow::Idle => BallSaveStatus::Inactive,
            SaveWindow::Held { .. } => BallSaveStatus::Active,
            SaveWindow::Armed { expires_at, .. } if now < expires_at => BallSaveStatus::Active,
            SaveWindow::Armed { .. } | SaveWindow::Expired => BallSaveStatus::GraceExpired,
        }
    }

    #[inline]
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.status(now) == BallSaveStatus::Active
    }

    /// Drain-shield lamp state; dark during the grace period
    pub fn lamp_lit(&self, now: Timestamp) -> bool {
        match self.window {
            SaveWindow::Held { .. } => true,
            SaveWindow::Armed { lamp_until, .. } => now < lamp_until,
            SaveWindow::Idle | SaveWindow::Expired => false,
        }
    }

    /// Milliseconds until the window closes
    pub fn remaining_ms(&self, now: Timestamp) -> Option<u64> {
        match self.window {
            SaveWindow::Held { requested_ms } => Some(requested_ms + self.grace_ms),
            SaveWindow::Armed { expires_at, .. } if now < expires_at => Some(expires_at - now),
            _ => None,
        }
    }

    /// Consume a save for a drained ball. True if the ball is to be relaunched.
    pub fn try_save(&mut self, now: Timestamp) -> bool {
        if !self.is_active(now) {
            return false;
        }
        self.saved += 1;
        self.balls = self.balls.saturating_sub(1);
        if self.balls == 0 || !self.allow_multiple {
            self.window = SaveWindow::Expired;
        }
        true
    }

    pub fn disable(&mut self) {
        self.window = SaveWindow::Idle;
        self.balls = 0;
        self.allow_multiple = false;
    }
}

/// Later of two windows; a held window keeps waiting for its release
fn extend(current: SaveWindow, request: SaveWindow) -> SaveWindow {
    match (current, request) {
        (
            SaveWindow::Armed {
                lamp_until: a_lamp,
                expires_at: a_end,
            },
            SaveWindow::Armed {
                lamp_until: b_lamp,
                expires_at: b_end,
            },
        ) => SaveWindow::Armed {
            lamp_until: a_lamp.max(b_lamp),
            expires_at: a_end.max(b_end),
        },
        (SaveWindow::Held { requested_ms: a }, SaveWindow::Held { requested_ms: b }) => {
            SaveWindow::Held {
                requested_ms: a.max(b),
            }
        }
        (SaveWindow::Held { .. }, armed @ SaveWindow::Armed { .. }) => armed,
        (armed @ SaveWindow::Armed { .. }, SaveWindow::Held { .. }) => armed,
        (_, request) => request,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODE
// ═══════════════════════════════════════════════════════════════════════════════

/// Keeps the drain-shield lamp in step with the [`BallSaver`] and starts
/// held countdowns when the ball leaves the shooter lane
#[derive(Debug, Default)]
pub struct BallSaveMode {
    lamp_lit: Option<bool>,
}

impl BallSaveMode {
    pub fn new() -> Self {
        Self::default()
    }

    fn plunged(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        let now = cx.now();
        if cx.service::<BallSaver>()?.release(now) {
            log::debug!("Ball save countdown started at {}", now);
        }
        Ok(Flow::Continue)
    }

    fn game_over(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        cx.service::<BallSaver>()?.disable();
        Ok(Flow::Continue)
    }
}

impl Mode for BallSaveMode {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_shooterR_inactive", Self::plunged)
            .on_event(events::GAME_ENDED, Self::game_over)
    }

    fn wiring(&self) -> Wiring {
        Wiring::new().lamps(&[lamp::DRAIN_SHIELD]).switches(&[sw::SHOOTER_R])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.lamp_lit = None;
        cx.service::<BallSaver>()?.disable();
        Ok(())
    }

    fn mode_tick(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let now = cx.now();
        let lit = cx.service::<BallSaver>()?.lamp_lit(now);
        if self.lamp_lit != Some(lit) {
            self.lamp_lit = Some(lit);
            if lit {
                cx.outputs().enable_lamp(lamp::DRAIN_SHIELD);
            } else {
                cx.outputs().disable_lamp(lamp::DRAIN_SHIELD);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saver() -> BallSaver {
        BallSaver::new(2.0)
    }

    #[test]
    fn test_grace_is_added_to_request() {
        let mut saver = saver();
        assert!(saver.start(BallSaveRequest::new(1, 5.0), Timestamp(1_000)));
        assert_eq!(saver.status(Timestamp(7_999)), BallSaveStatus::Active);
        assert_eq!(saver.status(Timestamp(8_000)), BallSaveStatus::GraceExpired);
        assert!(saver.lamp_lit(Timestamp(5_999)));
        assert!(!saver.lamp_lit(Timestamp(6_000)));
        assert_eq!(saver.remaining_ms(Timestamp(2_000)), Some(6_000));
    }

    #[test]
    fn test_held_countdown_waits_for_release() {
        let mut saver = saver();
        saver.start(BallSaveRequest::new(1, 5.0).held(), Timestamp(0));
        assert!(saver.is_active(Timestamp(60_000)));
        assert!(saver.release(Timestamp(60_000)));
        assert!(!saver.release(Timestamp(60_001)));
        assert!(saver.is_active(Timestamp(66_999)));
        assert!(!saver.is_active(Timestamp(67_000)));
    }

    #[test]
    fn test_single_save_closes_window() {
        let mut saver = saver();
        saver.start(BallSaveRequest::new(2, 10.0), Timestamp(0));
        assert!(saver.try_save(Timestamp(1_000)));
        assert!(!saver.try_save(Timestamp(1_500)));
        assert_eq!(saver.saved(), 1);
    }

    #[test]
    fn test_multiple_saves_until_balls_used() {
        let mut saver = saver();
        saver.start(BallSaveRequest::new(2, 10.0).multiple(), Timestamp(0));
        assert!(saver.try_save(Timestamp(1_000)));
        assert!(saver.try_save(Timestamp(2_000)));
        assert!(!saver.try_save(Timestamp(3_000)));
    }

    #[test]
    fn test_concurrent_requests() {
        let mut saver = saver();
        saver.start(BallSaveRequest::new(1, 5.0), Timestamp(0));
        assert!(!saver.start(BallSaveRequest::new(1, 20.0), Timestamp(1_000)));
        assert_eq!(saver.remaining_ms(Timestamp(1_000)), Some(6_000));

        assert!(saver.start(BallSaveRequest::new(2, 20.0).multiple(), Timestamp(1_000)));
        assert_eq!(saver.balls_remaining(), 3);
        assert_eq!(saver.remaining_ms(Timestamp(1_000)), Some(22_000));
    }

    #[test]
    fn test_disable_and_empty_requests() {
        let mut saver = saver();
        assert!(!saver.start(BallSaveRequest::new(1, 0.0), Timestamp(0)));
        assert!(!saver.start(BallSaveRequest::new(0, 5.0), Timestamp(0)));
        saver.start(BallSaveRequest::new(1, 5.0), Timestamp(0));
        saver.disable();
        assert_eq!(saver.status(Timestamp(1)), BallSaveStatus::Inactive);
        assert!(!saver.try_save(Timestamp(1)));
    }
}
