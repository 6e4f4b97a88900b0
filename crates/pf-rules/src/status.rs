//! Status line
//!
//! One line of small text along the bottom of the display. Rules post
//! messages to the [`StatusBoard`] service; the status line mode picks them
//! up on its next tick. Scrolling messages slide in from the right, hold,
//! then slide out to the left. Still messages show in place for 3 s.

use std::cell::Cell;
use std::rc::Rc;

use pf_core::PfResult;
use pf_dmd::{Direction, GroupedLayer, InOut, Justify, Layer, TextLayer, Transition, TransitionLayer};
use pf_engine::{Mode, ModeCx};

use crate::display::{self, DMD_HEIGHT, DMD_WIDTH};

pub const LINE_Y: i32 = 25;
pub const LINE_HEIGHT: usize = 7;

/// Frames a scrolled message holds still
pub const HOLD_FRAMES: u32 = 120;

pub const STILL_SECS: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub scroll: bool,
}

/// Message box between the rules and the status line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBoard {
    pending: Option<StatusMessage>,
    cleared: bool,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scroll `text` through the status line; replaces any unshown message
    pub fn post(&mut self, text: impl Into<String>) {
        self.pending = Some(StatusMessage {
            text: text.into(),
            scroll: true,
        });
    }

    pub fn post_still(&mut self, text: impl Into<String>) {
        self.pending = Some(StatusMessage {
            text: text.into(),
            scroll: false,
        });
    }

    /// Blank the line and drop any unshown message
    pub fn clear(&mut self) {
        self.pending = None;
        self.cleared = true;
    }

    pub fn pending(&self) -> Option<&StatusMessage> {
        self.pending.as_ref()
    }

    fn take(&mut self) -> (bool, Option<StatusMessage>) {
        (std::mem::take(&mut self.cleared), self.pending.take())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct StatusLineMode {
    /// [scrolling transition, still text]
    layer: Layer,
    scrolled_out: Rc<Cell<bool>>,
}

impl Default for StatusLineMode {
    fn default() -> Self {
        Self::new()
    }
}

fn line_text() -> TextLayer {
    TextLayer::new(display::small_font(), DMD_WIDTH as i32 / 2, 1, DMD_WIDTH, LINE_HEIGHT)
        .justify(Justify::Center)
}

impl StatusLineMode {
    pub fn new() -> Self {
        let scrolling = TransitionLayer::new(
            DMD_WIDTH,
            LINE_HEIGHT,
            Layer::empty(),
            Layer::text(line_text()),
            Transition::dont_move(),
        );
        let mut scrolling = Layer::transition(scrolling).at(0, LINE_Y);
        scrolling.enabled = false;
        let layers = vec![scrolling, Layer::text(line_text()).at(0, LINE_Y)];
        Self {
            layer: Layer::grouped(GroupedLayer::new(DMD_WIDTH, DMD_HEIGHT, layers)),
            scrolled_out: Rc::new(Cell::new(false)),
        }
    }

    /// Text currently on the line
    pub fn text(&mut self) -> Option<String> {
        let group = self.layer.as_grouped_mut()?;
        let (scrolling, still) = group.layers.split_at_mut(1);
        if scrolling[0].enabled {
            let wrapper = scrolling[0].as_transition_mut()?;
            return wrapper.to.as_text_mut()?.text().map(str::to_string);
        }
        still[0].as_text_mut()?.text().map(str::to_string)
    }

    fn scroll(done: Rc<Cell<bool>>) -> PfResult<Transition> {
        let mut transition = Transition::grouped(vec![
            Transition::slide(Direction::West),
            Transition::dont_move().with_frames(HOLD_FRAMES),
            Transition::slide(Direction::West).with_in_out(InOut::Out),
        ])?
        .on_complete(move || done.set(true));
        transition.start();
        Ok(transition)
    }

    fn show(&mut self, message: Option<&StatusMessage>) -> PfResult<()> {
        let transition = match message {
            Some(message) if message.scroll => Some(Self::scroll(self.scrolled_out.clone())?),
            _ => None,
        };
        let Some(group) = self.layer.as_grouped_mut() else {
            return Ok(());
        };
        let (scrolling, still) = group.layers.split_at_mut(1);
        let (scrolling, still) = (&mut scrolling[0], &mut still[0]);

        scrolling.enabled = transition.is_some();
        if let Some(wrapper) = scrolling.as_transition_mut() {
            let text = message.filter(|m| m.scroll).map(|m| m.text.as_str());
            if let Some(layer) = wrapper.to.as_text_mut() {
                layer.set_text(text, None);
            }
            if let Some(transition) = transition {
                wrapper.transition = transition;
            }
        }
        if let Some(layer) = still.as_text_mut() {
            let text = message.filter(|m| !m.scroll).map(|m| m.text.as_str());
            layer.set_text(text, Some(STILL_SECS));
        }
        Ok(())
    }
}

impl Mode for StatusLineMode {
    fn mode_started(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        cx.service::<StatusBoard>()?.clear();
        self.scrolled_out.set(false);
        self.show(None)
    }

    fn mode_tick(&mut self, cx: &mut ModeCx<'_, Self>) -> PfResult<()> {
        let (cleared, message) = cx.service::<StatusBoard>()?.take();
        if let Some(message) = message {
            log::trace!("Status: {}", message.text);
            self.scrolled_out.set(false);
            return self.show(Some(&message));
        }
        if cleared || self.scrolled_out.replace(false) {
            self.show(None)?;
        }
        Ok(())
    }

    fn layer(&mut self) -> Option<&mut Layer> {
        Some(&mut self.layer)
    }
}
