//! Stall search
//!
//! Ejects balls stuck in a shooter lane or popper because a coil did not
//! fire. Rules keeping a ball on purpose mark its switch captive in the
//! [`CaptiveBalls`] service and release the mark once they eject it.

use pf_core::PfResult;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};

use crate::playfield::sw;

/// Seconds between two checks
pub const CHECK_PERIOD_SECS: f64 = 2.0;

/// Seconds between two ejects of one check
pub const EJECT_SPACING_SECS: f64 = 0.125;

/// During a game a ball must rest this long before it is ejected
const IN_GAME_REST_MS: u64 = 2_000;

const CHECK: &str = "check";

/// Ball holders currently keeping a ball on purpose
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptiveBalls {
    captive: Vec<&'static str>,
    /// An eject just happened; the next check waits a full period
    released: bool,
}

impl CaptiveBalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_captive(&mut self, switch: &'static str) {
        if !self.captive.contains(&switch) {
            self.captive.push(switch);
        }
    }

    /// The rule ejected its ball; give it time to leave before checking
    pub fn release(&mut self, switch: &str) {
        let before = self.captive.len();
        self.captive.retain(|held| *held != switch);
        if self.captive.len() != before {
            self.released = true;
        }
    }

    #[inline]
    pub fn is_captive(&self, switch: &str) -> bool {
        self.captive.contains(&switch)
    }

    pub fn clear(&mut self) {
        self.captive.clear();
        self.released = false;
    }

    fn take_released(&mut self) -> bool {
        std::mem::take(&mut self.released)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct StallSearchMode;

impl StallSearchMode {
    pub fn new() -> Self {
        Self
    }

    fn schedule(cx: &mut ModeCx<'_, Self>, seconds: f64) {
        cx.delay(CHECK, seconds, |mode, cx| mode.check(cx));
    }

    fn check_now(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.cancel_delayed(CHECK);
        self.check(cx)
    }

    fn check(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let now = cx.now();
        let rest_ms = if cx.game().is_in_progress() {
            IN_GAME_REST_MS
        } else {
            0
        };

        let mut at = 0.0;
        for holder in sw::BALL_HOLDERS {
            if cx.service::<CaptiveBalls>()?.is_captive(holder) {
                continue;
            }
            if !cx.switches().is_active_for(holder, rest_ms, now) {
                continue;
            }
            log::debug!("Stall search: ball resting in {}", holder);
            cx.delay(&format!("pop_{}", holder), at, move |_, cx| {
                // Pulsing with the coin door open only makes the coil buzz
                if cx.switches().is_active(holder) && cx.switches().is_active(sw::COIN_DOOR) {
                    cx.outputs().pulse_default(holder);
                }
                Ok(())
            });
            at += EJECT_SPACING_SECS;
        }
        Self::schedule(cx, CHECK_PERIOD_SECS.max(at));
        Ok(())
    }

    fn lane_held(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.check_now(cx)?;
        Ok(Flow::Continue)
    }
}

impl Mode for StallSearchMode {
    fn handlers(&self) -> HandlerTable<Self> {
        sw::BALL_HOLDERS.iter().fold(HandlerTable::new(), |table, holder| {
            table.on(&format!("sw_{}_active_for_300ms", holder), Self::lane_held)
        })
    }

    fn wiring(&self) -> Wiring {
        // Every ball holder has an eject coil of the same name
        Wiring::new()
            .coils(&sw::BALL_HOLDERS)
            .switches(&[sw::COIN_DOOR])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.service::<CaptiveBalls>()?.clear();
        self.check_now(cx)
    }

    fn mode_tick(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        if cx.service::<CaptiveBalls>()?.take_released() {
            Self::schedule(cx, CHECK_PERIOD_SECS);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captive_marks() {
        let mut captive = CaptiveBalls::new();
        captive.mark_captive(sw::POPPER_R);
        captive.mark_captive(sw::POPPER_R);
        assert!(captive.is_captive(sw::POPPER_R));
        assert!(!captive.is_captive(sw::POPPER_L));

        captive.release(sw::POPPER_L);
        assert!(!captive.take_released());

        captive.release(sw::POPPER_R);
        assert!(!captive.is_captive(sw::POPPER_R));
        assert!(captive.take_released());
        assert!(!captive.take_released());
    }
}
