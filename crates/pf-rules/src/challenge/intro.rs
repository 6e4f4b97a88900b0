//! Stage intro: scrolls the instructions of the next stage, with flippers
//! and GI off. Ends after a time set by the text length, or on a flipper.

use pf_core::PfResult;
use pf_dmd::Layer;
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Mode, ModeCx, Wiring};

use super::Stage;
use crate::INTRO_FINISHED;
use crate::display;
use crate::playfield::lamp;

/// Characters of instruction text read per second
pub const CHARS_PER_SEC: f64 = 16.0;

const FINISH: &str = "finish";

/// What the next intro announces, set by the challenge before adding it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntroRequest {
    pub stage: Stage,
    /// A ball waits in the right popper for the stage
    pub eject: bool,
}

#[derive(Debug, Default)]
pub struct IntroMode {
    stage: Stage,
    layer: Option<Layer>,
}

/// Seconds the intro of `stage` stays up
pub fn intro_secs(stage: Stage) -> f64 {
    let chars: usize = stage.instructions().iter().map(|line| line.len() + 1).sum();
    chars as f64 / CHARS_PER_SEC
}

impl IntroMode {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn finish(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.cancel_delayed(FINISH);
        self.layer = None;
        cx.remove_self()?;
        cx.send_event(INTRO_FINISHED);
        Ok(())
    }

    fn flipper(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.finish(cx)?;
        Ok(Flow::Continue)
    }
}

impl Mode for IntroMode {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_flipperLwL_active", Self::flipper)
            .on("sw_flipperLwR_active", Self::flipper)
    }

    fn wiring(&self) -> Wiring {
        Wiring::new()
            .lamps(&lamp::GI)
            .lamps(&[lamp::RIGHT_START_FEATURE])
    }

    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let request = *cx.service::<IntroRequest>()?;
        self.stage = request.stage;
        let outputs = cx.outputs();
        outputs.stop_music();
        outputs.enable_flippers(false);
        for gi in lamp::GI {
            outputs.disable_lamp(gi);
        }
        outputs.disable_lamp(lamp::RIGHT_START_FEATURE);

        self.layer = Some(display::panning(self.stage.instructions(), 2));
        cx.delay(FINISH, intro_secs(self.stage), |mode, cx| mode.finish(cx));
        Ok(())
    }

    fn mode_stopped(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        self.layer = None;
        let outputs = cx.outputs();
        outputs.enable_flippers(true);
        for gi in lamp::GI {
            outputs.enable_lamp(gi);
        }
        Ok(())
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        self.layer.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intro_length_follows_text() {
        for stage in Stage::ALL {
            let secs = intro_secs(stage);
            assert!(secs > 10.0 && secs < 30.0, "{:?}: {}", stage, secs);
        }
        assert!(intro_secs(Stage::Fire) > intro_secs(Stage::Celebration));
    }
}
