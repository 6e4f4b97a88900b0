//! Layers
//!
//! A layer produces at most one frame per tick through `next_frame(now)`.
//! `None` means "nothing to show", letting layers below show through.

use std::fmt;
use std::rc::Rc;

use pf_core::Timestamp;

use crate::{BlendOp, Compositor, Font, Frame, LayerFrame, MAX_DOT, Transition};

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Horizontal alignment of text around the anchor x
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justify {
    #[default]
    Left,
    Center,
    Right,
}

/// Single line of text with optional expiry and blinking
pub struct TextLayer {
    x: i32,
    y: i32,
    width: usize,
    height: usize,
    font: Rc<dyn Font>,
    justify: Justify,
    fill: Option<u8>,
    text: Option<String>,
    frame: Option<Frame>,
    seconds: Option<f64>,
    started_at: Option<Timestamp>,
    blink_frames: u32,
    blink_counter: u32,
    blanked: bool,
}

impl fmt::Debug for TextLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextLayer")
            .field("text", &self.text)
            .field("seconds", &self.seconds)
            .field("blink_frames", &self.blink_frames)
            .finish()
    }
}

impl TextLayer {
    /// Text anchored at (x, y) on a `width` x `height` canvas
    pub fn new(font: Rc<dyn Font>, x: i32, y: i32, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            font,
            justify: Justify::Left,
            fill: None,
            text: None,
            frame: None,
            seconds: None,
            started_at: None,
            blink_frames: 0,
            blink_counter: 0,
            blanked: false,
        }
    }

    pub fn justify(mut self, justify: Justify) -> Self {
        self.justify = justify;
        self
    }

    /// Fill the whole canvas behind the text
    pub fn fill(mut self, value: u8) -> Self {
        self.fill = Some(value.min(MAX_DOT));
        self
    }

    /// Show `text` (or clear with `None`), optionally for `seconds` only
    pub fn set_text(&mut self, text: Option<&str>, seconds: Option<f64>) -> &mut Self {
        self.set_blinking_text(text, seconds, 0)
    }

    /// Like `set_text`, toggling visibility every `blink_frames` frames
    pub fn set_blinking_text(
        &mut self,
        text: Option<&str>,
        seconds: Option<f64>,
        blink_frames: u32,
    ) -> &mut Self {
        self.started_at = None;
        self.seconds = seconds;
        self.blink_frames = blink_frames;
        self.blink_counter = blink_frames;
        self.blanked = false;
        self.text = text.map(str::to_string);
        let frame = text.map(|t| self.render(t));
        self.frame = frame;
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn render(&self, text: &str) -> Frame {
        let mut frame = Frame::new(self.width, self.height);
        if let Some(value) = self.fill {
            frame.fill(value);
        }
        let (w, _) = self.font.measure(text);
        let x = match self.justify {
            Justify::Left => self.x,
            Justify::Center => self.x - w as i32 / 2,
            Justify::Right => self.x - w as i32,
        };
        self.font.draw(&mut frame, text, x, self.y, MAX_DOT);
        frame
    }

    pub fn next_frame(&mut self, now: Timestamp) -> Option<Frame> {
        let frame = self.frame.as_ref()?;
        let started = *self.started_at.get_or_insert(now);
        if let Some(seconds) = self.seconds {
            if now.as_secs_f64() - started.as_secs_f64() >= seconds {
                self.frame = None;
                self.text = None;
                return None;
            }
        }
        if self.blink_frames > 0 {
            if self.blink_counter == 0 {
                self.blink_counter = self.blink_frames;
                self.blanked = !self.blanked;
            } else {
                self.blink_counter -= 1;
            }
        }
        if self.blanked {
            Some(Frame::new(self.width, self.height))
        } else {
            Some(frame.clone())
        }
    }

    fn reset(&mut self) {
        self.started_at = None;
        self.blink_counter = self.blink_frames;
        self.blanked = false;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANIMATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Plays a list of frames
#[derive(Debug, Clone, Default)]
pub struct AnimatedLayer {
    frames: Vec<Frame>,
    /// Ticks each frame is shown
    frame_time: u32,
    repeat: bool,
    hold: bool,
    index: usize,
    ticks: u32,
}

impl AnimatedLayer {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            frame_time: 1,
            ..Default::default()
        }
    }

    pub fn with_frame_time(mut self, ticks: u32) -> Self {
        self.frame_time = ticks.max(1);
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Keep showing the last frame after the end
    pub fn holding(mut self) -> Self {
        self.hold = true;
        self
    }

    pub fn is_finished(&self) -> bool {
        !self.repeat && self.index >= self.frames.len()
    }

    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.frames.is_empty() {
            return None;
        }
        if self.index >= self.frames.len() {
            if self.repeat {
                self.index = 0;
            } else if self.hold {
                return self.frames.last().cloned();
            } else {
                return None;
            }
        }
        let frame = self.frames[self.index].clone();
        self.ticks += 1;
        if self.ticks >= self.frame_time {
            self.ticks = 0;
            self.index += 1;
        }
        Some(frame)
    }

    fn reset(&mut self) {
        self.index = 0;
        self.ticks = 0;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GROUPED
// ═══════════════════════════════════════════════════════════════════════════════

/// Composite of child layers, later children on top
#[derive(Debug)]
pub struct GroupedLayer {
    width: usize,
    height: usize,
    fill: Option<u8>,
    pub layers: Vec<Layer>,
}

impl GroupedLayer {
    pub fn new(width: usize, height: usize, layers: Vec<Layer>) -> Self {
        Self {
            width,
            height,
            fill: None,
            layers,
        }
    }

    pub fn fill(mut self, value: u8) -> Self {
        self.fill = Some(value.min(MAX_DOT));
        self
    }

    pub fn next_frame(&mut self, now: Timestamp) -> Option<Frame> {
        let mut frame = Frame::new(self.width, self.height);
        if let Some(value) = self.fill {
            frame.fill(value);
        }
        for layer in self.layers.iter_mut() {
            if let Some(captured) = LayerFrame::capture(layer, now) {
                captured.draw_onto(&mut frame);
            }
        }
        Some(frame)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCRIPTED
// ═══════════════════════════════════════════════════════════════════════════════

/// One step of a scripted sequence
#[derive(Debug)]
pub struct ScriptEntry {
    pub seconds: f64,
    pub layer: Layer,
    /// Played from the previous entry's last frame into this one
    pub transition: Option<Transition>,
}

impl ScriptEntry {
    pub fn new(seconds: f64, layer: Layer) -> Self {
        Self {
            seconds,
            layer,
            transition: None,
        }
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }
}

/// Shows a list of layers one after another
#[derive(Debug)]
pub struct ScriptedLayer {
    width: usize,
    height: usize,
    script: Vec<ScriptEntry>,
    index: usize,
    entered_at: Option<Timestamp>,
    hold: bool,
    completed: bool,
    last_frame: Option<Frame>,
    outgoing: Option<Frame>,
}

impl ScriptedLayer {
    pub fn new(width: usize, height: usize, script: Vec<ScriptEntry>) -> Self {
        Self {
            width,
            height,
            script,
            index: 0,
            entered_at: None,
            hold: false,
            completed: false,
            last_frame: None,
            outgoing: None,
        }
    }

    /// Stop on the last entry instead of looping
    pub fn holding(mut self) -> Self {
        self.hold = true;
        self
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    /// Jump to the next (or previous) entry now
    pub fn force_next(&mut self, forward: bool, now: Timestamp) {
        if self.script.is_empty() {
            return;
        }
        self.completed = false;
        self.enter(if forward { 1 } else { -1 }, now);
    }

    fn enter(&mut self, step: isize, now: Timestamp) {
        let len = self.script.len() as isize;
        self.index = ((self.index as isize + step).rem_euclid(len)) as usize;
        self.entered_at = Some(now);
        self.outgoing = self.last_frame.clone();
        let entry = &mut self.script[self.index];
        entry.layer.reset();
        if let Some(transition) = entry.transition.as_mut() {
            transition.start();
        }
    }

    pub fn next_frame(&mut self, now: Timestamp) -> Option<Frame> {
        if self.script.is_empty() {
            return None;
        }
        let entered = *self.entered_at.get_or_insert(now);
        let elapsed = now.as_secs_f64() - entered.as_secs_f64();
        if !self.completed && elapsed >= self.script[self.index].seconds {
            if self.hold && self.index + 1 == self.script.len() {
                self.completed = true;
            } else {
                self.enter(1, now);
            }
        }

        let (width, height) = (self.width, self.height);
        let entry = &mut self.script[self.index];
        let mut frame = entry.layer.next_frame(now);
        if let Some(transition) = entry.transition.as_mut() {
            if transition.is_running() {
                let blank = || Frame::new(width, height);
                let from = self.outgoing.clone().unwrap_or_else(blank);
                let to = frame.unwrap_or_else(blank);
                frame = Some(transition.next_frame(&from, &to));
            }
        }
        self.last_frame = frame.clone();
        frame
    }

    fn reset(&mut self) {
        self.index = 0;
        self.entered_at = None;
        self.completed = false;
        self.last_frame = None;
        self.outgoing = None;
        if let Some(entry) = self.script.first_mut() {
            entry.layer.reset();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Scrolls a window across a larger frame
#[derive(Debug, Clone)]
pub struct PanningLayer {
    width: usize,
    height: usize,
    frame: Frame,
    origin: (i32, i32),
    position: (i32, i32),
    translate: (i32, i32),
    bounce: bool,
    ticks_per_move: u32,
    ticks: u32,
}

impl PanningLayer {
    pub fn new(width: usize, height: usize, frame: Frame, origin: (i32, i32), translate: (i32, i32)) -> Self {
        Self {
            width,
            height,
            frame,
            origin,
            position: origin,
            translate,
            bounce: false,
            ticks_per_move: 1,
            ticks: 0,
        }
    }

    pub fn bouncing(mut self) -> Self {
        self.bounce = true;
        self
    }

    pub fn with_ticks_per_move(mut self, ticks: u32) -> Self {
        self.ticks_per_move = ticks.max(1);
        self
    }

    #[inline]
    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    pub fn next_frame(&mut self) -> Option<Frame> {
        let mut out = Frame::new(self.width, self.height);
        out.blit(&self.frame, -self.position.0, -self.position.1, BlendOp::Copy);
        self.ticks += 1;
        if self.ticks >= self.ticks_per_move {
            self.ticks = 0;
            self.step();
        }
        Some(out)
    }

    fn step(&mut self) {
        let max_x = self.frame.width().saturating_sub(self.width) as i32;
        let max_y = self.frame.height().saturating_sub(self.height) as i32;
        let mut next = (
            self.position.0 + self.translate.0,
            self.position.1 + self.translate.1,
        );
        if self.bounce {
            if next.0 < 0 || next.0 > max_x {
                self.translate.0 = -self.translate.0;
                next.0 = (self.position.0 + self.translate.0).clamp(0, max_x);
            }
            if next.1 < 0 || next.1 > max_y {
                self.translate.1 = -self.translate.1;
                next.1 = (self.position.1 + self.translate.1).clamp(0, max_y);
            }
        } else {
            next = (next.0.clamp(0, max_x), next.1.clamp(0, max_y));
        }
        self.position = next;
    }

    fn reset(&mut self) {
        self.position = self.origin;
        self.ticks = 0;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSITION WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Blends an outgoing layer into an incoming one
#[derive(Debug)]
pub struct TransitionLayer {
    width: usize,
    height: usize,
    pub from: Layer,
    pub to: Layer,
    pub transition: Transition,
}

impl TransitionLayer {
    pub fn new(width: usize, height: usize, from: Layer, to: Layer, transition: Transition) -> Self {
        Self {
            width,
            height,
            from,
            to,
            transition,
        }
    }

    pub fn next_frame(&mut self, now: Timestamp) -> Option<Frame> {
        let from = self
            .from
            .next_frame(now)
            .unwrap_or_else(|| Frame::new(self.width, self.height));
        let to = self
            .to
            .next_frame(now)
            .unwrap_or_else(|| Frame::new(self.width, self.height));
        Some(self.transition.next_frame(&from, &to))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAYER
// ═══════════════════════════════════════════════════════════════════════════════

/// What a layer renders
#[derive(Debug)]
pub enum LayerContent {
    /// Static frame, `None` shows nothing
    Frame(Option<Frame>),
    Text(TextLayer),
    Animated(AnimatedLayer),
    Grouped(GroupedLayer),
    Scripted(ScriptedLayer),
    Panning(PanningLayer),
    Transition(Box<TransitionLayer>),
}

/// Renderable unit owned by a mode
#[derive(Debug)]
pub struct Layer {
    pub content: LayerContent,
    /// Hides every layer beneath it
    pub opaque: bool,
    pub op: BlendOp,
    pub enabled: bool,
    /// Offset of the layer's frame on the display
    pub x: i32,
    pub y: i32,
}

impl Layer {
    pub fn new(content: LayerContent) -> Self {
        Self {
            content,
            opaque: false,
            op: BlendOp::Overlay,
            enabled: true,
            x: 0,
            y: 0,
        }
    }

    pub fn frame(frame: Frame) -> Self {
        Self::new(LayerContent::Frame(Some(frame)))
    }

    pub fn empty() -> Self {
        Self::new(LayerContent::Frame(None))
    }

    pub fn text(text: TextLayer) -> Self {
        Self::new(LayerContent::Text(text))
    }

    pub fn animated(animation: AnimatedLayer) -> Self {
        Self::new(LayerContent::Animated(animation))
    }

    pub fn grouped(group: GroupedLayer) -> Self {
        Self::new(LayerContent::Grouped(group))
    }

    pub fn scripted(script: ScriptedLayer) -> Self {
        Self::new(LayerContent::Scripted(script))
    }

    pub fn panning(panning: PanningLayer) -> Self {
        Self::new(LayerContent::Panning(panning))
    }

    pub fn transition(wrapper: TransitionLayer) -> Self {
        Self::new(LayerContent::Transition(Box::new(wrapper)))
    }

    pub fn opaque(mut self) -> Self {
        self.opaque = true;
        self
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_op(mut self, op: BlendOp) -> Self {
        self.op = op;
        self
    }

    /// Frame for this tick; disabled layers show nothing
    pub fn next_frame(&mut self, now: Timestamp) -> Option<Frame> {
        if !self.enabled {
            return None;
        }
        match &mut self.content {
            LayerContent::Frame(frame) => frame.clone(),
            LayerContent::Text(text) => text.next_frame(now),
            LayerContent::Animated(animation) => animation.next_frame(),
            LayerContent::Grouped(group) => group.next_frame(now),
            LayerContent::Scripted(script) => script.next_frame(now),
            LayerContent::Panning(panning) => panning.next_frame(),
            LayerContent::Transition(wrapper) => wrapper.next_frame(now),
        }
    }

    /// Rewind timers and animations
    pub fn reset(&mut self) {
        match &mut self.content {
            LayerContent::Frame(_) => {}
            LayerContent::Text(text) => text.reset(),
            LayerContent::Animated(animation) => animation.reset(),
            LayerContent::Grouped(group) => group.layers.iter_mut().for_each(Layer::reset),
            LayerContent::Scripted(script) => script.reset(),
            LayerContent::Panning(panning) => panning.reset(),
            LayerContent::Transition(wrapper) => {
                wrapper.from.reset();
                wrapper.to.reset();
                wrapper.transition.start();
            }
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextLayer> {
        match &mut self.content {
            LayerContent::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_grouped_mut(&mut self) -> Option<&mut GroupedLayer> {
        match &mut self.content {
            LayerContent::Grouped(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_scripted_mut(&mut self) -> Option<&mut ScriptedLayer> {
        match &mut self.content {
            LayerContent::Scripted(script) => Some(script),
            _ => None,
        }
    }

    pub fn as_transition(&self) -> Option<&TransitionLayer> {
        match &self.content {
            LayerContent::Transition(wrapper) => Some(wrapper),
            _ => None,
        }
    }

    pub fn as_transition_mut(&mut self) -> Option<&mut TransitionLayer> {
        match &mut self.content {
            LayerContent::Transition(wrapper) => Some(wrapper),
            _ => None,
        }
    }
}

/// Compose a stack of layers listed top-down into one frame
pub fn compose_layers<'a, I>(compositor: &Compositor, layers: I, now: Timestamp) -> Frame
where
    I: IntoIterator<Item = &'a mut Layer>,
{
    let mut captured = Vec::new();
    for layer in layers {
        if let Some(frame) = LayerFrame::capture(layer, now) {
            captured.push(frame);
        }
        if layer.enabled && layer.opaque {
            break;
        }
    }
    compositor.compose(&captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockFont;

    fn font() -> Rc<dyn Font> {
        Rc::new(BlockFont::tiny())
    }

    #[test]
    fn test_text_expires() {
        let mut text = TextLayer::new(font(), 0, 0, 32, 8);
        text.set_text(Some("HI"), Some(1.0));
        assert!(text.next_frame(Timestamp(1000)).is_some());
        assert!(text.next_frame(Timestamp(1900)).is_some());
        assert!(text.next_frame(Timestamp(2000)).is_none());
        assert_eq!(text.text(), None);
    }

    #[test]
    fn test_text_blinks() {
        let mut text = TextLayer::new(font(), 0, 0, 32, 8);
        text.set_blinking_text(Some("X"), None, 2);
        let lit: Vec<bool> = (0..6)
            .map(|i| !text.next_frame(Timestamp(i)).unwrap().is_blank())
            .collect();
        assert_eq!(lit, vec![true, true, false, false, false, true]);
    }

    #[test]
    fn test_text_justify_center() {
        let mut text = TextLayer::new(font(), 16, 0, 32, 8).justify(Justify::Center);
        text.set_text(Some("I"), None);
        let frame = text.next_frame(Timestamp(0)).unwrap();
        // "I" is 3 wide, so it starts at 16 - 1 = 15.
        assert_eq!(frame.get(15, 0), MAX_DOT);
        assert_eq!(frame.get(14, 0), 0);
    }

    #[test]
    fn test_animation_repeat_and_hold() {
        let frames = vec![Frame::filled(1, 1, 1), Frame::filled(1, 1, 2)];
        let mut once = AnimatedLayer::new(frames.clone());
        assert_eq!(once.next_frame().unwrap().get(0, 0), 1);
        assert_eq!(once.next_frame().unwrap().get(0, 0), 2);
        assert!(once.next_frame().is_none());
        assert!(once.is_finished());

        let mut held = AnimatedLayer::new(frames.clone()).holding().with_frame_time(2);
        let values: Vec<u8> = (0..6).map(|_| held.next_frame().unwrap().get(0, 0)).collect();
        assert_eq!(values, vec![1, 1, 2, 2, 2, 2]);

        let mut looped = AnimatedLayer::new(frames).repeating();
        let values: Vec<u8> = (0..3).map(|_| looped.next_frame().unwrap().get(0, 0)).collect();
        assert_eq!(values, vec![1, 2, 1]);
    }

    #[test]
    fn test_scripted_advances_and_wraps() {
        let mut script = ScriptedLayer::new(
            1,
            1,
            vec![
                ScriptEntry::new(1.0, Layer::frame(Frame::filled(1, 1, 1))),
                ScriptEntry::new(2.0, Layer::frame(Frame::filled(1, 1, 2))),
            ],
        );
        assert_eq!(script.next_frame(Timestamp(0)).unwrap().get(0, 0), 1);
        assert_eq!(script.next_frame(Timestamp(999)).unwrap().get(0, 0), 1);
        assert_eq!(script.next_frame(Timestamp(1000)).unwrap().get(0, 0), 2);
        assert_eq!(script.next_frame(Timestamp(3000)).unwrap().get(0, 0), 1);
        script.force_next(false, Timestamp(3100));
        assert_eq!(script.index(), 1);
    }

    #[test]
    fn test_scripted_hold_completes() {
        let mut script = ScriptedLayer::new(
            1,
            1,
            vec![
                ScriptEntry::new(1.0, Layer::frame(Frame::filled(1, 1, 1))),
                ScriptEntry::new(1.0, Layer::frame(Frame::filled(1, 1, 2))),
            ],
        )
        .holding();
        script.next_frame(Timestamp(0));
        script.next_frame(Timestamp(1000));
        script.next_frame(Timestamp(2000));
        assert!(script.is_completed());
        assert_eq!(script.next_frame(Timestamp(9000)).unwrap().get(0, 0), 2);
    }

    #[test]
    fn test_panning_bounces() {
        let mut wide = Frame::new(4, 1);
        wide.set(3, 0, 9);
        let mut pan = PanningLayer::new(2, 1, wide, (0, 0), (1, 0)).bouncing();
        let positions: Vec<i32> = (0..5)
            .map(|_| {
                pan.next_frame();
                pan.position().0
            })
            .collect();
        assert_eq!(positions, vec![1, 2, 1, 0, 1]);
    }

    #[test]
    fn test_disabled_layer_shows_nothing() {
        let mut layer = Layer::frame(Frame::filled(2, 2, 5));
        layer.enabled = false;
        assert!(layer.next_frame(Timestamp(0)).is_none());
    }
}
