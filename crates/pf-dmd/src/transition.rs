//! Transition System
//!
//! Frame-driven blends between an outgoing and an incoming frame:
//! - Slide (incoming frame scrolls over black)
//! - Push (incoming frame pushes the outgoing one away)
//! - Crossfade
//! - Don't-move (hold, useful inside a group)
//! - Grouped (run several transitions back to back)
//!
//! Progress advances by `progress_per_frame` on every `next_frame()` call.
//! When it reaches 1.0 the transition completes, fires its completion
//! callback once and from then on returns the target frame.

use std::fmt;

use pf_core::{PfError, PfResult};
use serde::{Deserialize, Serialize};

use crate::{BlendOp, Frame};

/// Default transition speed: one second at 60 fps
pub const DEFAULT_PROGRESS_PER_FRAME: f32 = 1.0 / 60.0;

/// Slack for accumulated float error when testing for completion
const PROGRESS_EPSILON: f32 = 1e-4;

/// Direction the incoming frame travels towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    North,
    South,
    East,
    West,
}

/// Whether the transition brings content in or takes it out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InOut {
    #[default]
    In,
    Out,
}

/// Lifecycle of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    NotStarted,
    Running,
    Completed,
}

/// Progress shaping curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    /// Slow start
    EaseInQuad,
    /// Slow end
    EaseOutQuad,
    /// Sine-based S-curve
    SCurve,
}

impl Easing {
    /// Apply the curve to a linear progress value (0.0-1.0)
    #[inline]
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::SCurve => (1.0 - (t * std::f32::consts::PI).cos()) / 2.0,
        }
    }
}

enum Kind {
    Slide(Direction),
    Push(Direction),
    Crossfade,
    DontMove,
    Grouped { parts: Vec<Transition>, current: usize },
}

impl Kind {
    fn label(&self) -> &'static str {
        match self {
            Kind::Slide(_) => "slide",
            Kind::Push(_) => "push",
            Kind::Crossfade => "crossfade",
            Kind::DontMove => "dont_move",
            Kind::Grouped { .. } => "grouped",
        }
    }
}

/// Completion callback
pub type CompletionHandler = Box<dyn FnMut()>;

/// A blend between two frames driven one frame at a time
pub struct Transition {
    kind: Kind,
    progress: f32,
    progress_per_frame: f32,
    in_out: InOut,
    easing: Easing,
    state: TransitionState,
    on_complete: Option<CompletionHandler>,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("kind", &self.kind.label())
            .field("progress", &self.progress)
            .field("progress_per_frame", &self.progress_per_frame)
            .field("in_out", &self.in_out)
            .field("state", &self.state)
            .finish()
    }
}

impl Transition {
    fn with_kind(kind: Kind) -> Self {
        Self {
            kind,
            progress: 0.0,
            progress_per_frame: DEFAULT_PROGRESS_PER_FRAME,
            in_out: InOut::In,
            easing: Easing::Linear,
            state: TransitionState::NotStarted,
            on_complete: None,
        }
    }

    /// Incoming frame scrolls over black in `direction` (20 frames)
    pub fn slide(direction: Direction) -> Self {
        Self::with_kind(Kind::Slide(direction)).with_frames(20)
    }

    /// Incoming frame pushes the outgoing frame off in `direction`
    pub fn push(direction: Direction) -> Self {
        Self::with_kind(Kind::Push(direction))
    }

    pub fn crossfade() -> Self {
        Self::with_kind(Kind::Crossfade)
    }

    /// Shows the incoming frame unchanged for the transition's duration
    pub fn dont_move() -> Self {
        Self::with_kind(Kind::DontMove)
    }

    /// Runs `parts` one after another. An empty list is rejected.
    pub fn grouped(parts: Vec<Transition>) -> PfResult<Self> {
        if parts.is_empty() {
            return Err(PfError::InvalidTransition(
                "grouped transition needs at least one part".into(),
            ));
        }
        Ok(Self::with_kind(Kind::Grouped { parts, current: 0 }))
    }

    // ───────────────────────────────────────────────────────────────────────
    // Builder
    // ───────────────────────────────────────────────────────────────────────

    pub fn with_progress_per_frame(mut self, step: f32) -> Self {
        self.progress_per_frame = step.max(f32::EPSILON);
        self
    }

    /// Complete after `frames` frames
    pub fn with_frames(self, frames: u32) -> Self {
        self.with_progress_per_frame(1.0 / frames.max(1) as f32)
    }

    pub fn with_in_out(mut self, in_out: InOut) -> Self {
        self.in_out = in_out;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn on_complete(mut self, handler: impl FnMut() + 'static) -> Self {
        self.on_complete = Some(Box::new(handler));
        self
    }

    pub fn set_on_complete(&mut self, handler: impl FnMut() + 'static) {
        self.on_complete = Some(Box::new(handler));
    }

    // ───────────────────────────────────────────────────────────────────────
    // Control
    // ───────────────────────────────────────────────────────────────────────

    /// Rewind and run
    pub fn start(&mut self) {
        self.reset();
        self.state = TransitionState::Running;
        if let Kind::Grouped { parts, .. } = &mut self.kind {
            parts[0].start();
        }
    }

    /// Rewind without running
    pub fn reset(&mut self) {
        self.progress = 0.0;
        self.state = TransitionState::NotStarted;
        if let Kind::Grouped { parts, current } = &mut self.kind {
            *current = 0;
            for part in parts.iter_mut() {
                part.reset();
            }
        }
    }

    #[inline]
    pub fn state(&self) -> TransitionState {
        self.state
    }

    #[inline]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == TransitionState::Running
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.state == TransitionState::Completed
    }

    /// Index of the running part of a grouped transition
    pub fn current_part(&self) -> Option<usize> {
        match &self.kind {
            Kind::Grouped { current, .. } => Some(*current),
            _ => None,
        }
    }

    fn complete(&mut self) {
        self.progress = 1.0;
        self.state = TransitionState::Completed;
        if let Some(handler) = self.on_complete.as_mut() {
            handler();
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Rendering
    // ───────────────────────────────────────────────────────────────────────

    /// Produce the next frame of the blend from `from` to `to`
    pub fn next_frame(&mut self, from: &Frame, to: &Frame) -> Frame {
        if let Kind::Grouped { .. } = self.kind {
            return self.next_grouped_frame(from, to);
        }
        match self.state {
            TransitionState::NotStarted => self.start_frame(from, to),
            TransitionState::Completed => self.end_frame(from, to),
            TransitionState::Running => {
                self.progress = (self.progress + self.progress_per_frame).min(1.0);
                if self.progress >= 1.0 - PROGRESS_EPSILON {
                    self.complete();
                    return self.end_frame(from, to);
                }
                self.blend(from, to, self.easing.apply(self.progress))
            }
        }
    }

    fn next_grouped_frame(&mut self, from: &Frame, to: &Frame) -> Frame {
        let state = self.state;
        let Kind::Grouped { parts, current } = &mut self.kind else {
            return to.clone();
        };
        if state != TransitionState::Running {
            return parts[*current].next_frame(from, to);
        }
        let frame = parts[*current].next_frame(from, to);
        if parts[*current].is_completed() {
            if *current + 1 < parts.len() {
                *current += 1;
                parts[*current].start();
            } else {
                self.complete();
            }
        }
        frame
    }

    /// Frame shown before the transition runs
    fn start_frame(&self, from: &Frame, to: &Frame) -> Frame {
        match (&self.kind, self.in_out) {
            (Kind::Slide(_), InOut::In) => Frame::new(to.width(), to.height()),
            (_, InOut::In) => from.clone(),
            (_, InOut::Out) => to.clone(),
        }
    }

    /// Frame shown once the transition has completed
    fn end_frame(&self, from: &Frame, to: &Frame) -> Frame {
        match (&self.kind, self.in_out) {
            (_, InOut::In) => to.clone(),
            (Kind::Slide(_), InOut::Out) => Frame::new(to.width(), to.height()),
            (_, InOut::Out) => from.clone(),
        }
    }

    fn blend(&self, from: &Frame, to: &Frame, t: f32) -> Frame {
        let (width, height) = to.size();
        match &self.kind {
            Kind::Slide(direction) => {
                let prog = match self.in_out {
                    InOut::In => 1.0 - t,
                    InOut::Out => -t,
                };
                let (dx, dy) = offset(*direction, prog, width, height);
                let mut frame = Frame::new(width, height);
                frame.blit(to, dx, dy, BlendOp::Copy);
                frame
            }
            Kind::Push(direction) => {
                let t = match self.in_out {
                    InOut::In => t,
                    InOut::Out => 1.0 - t,
                };
                let (ix, iy) = offset(*direction, 1.0 - t, width, height);
                let (ox, oy) = offset(*direction, -t, width, height);
                let mut frame = Frame::new(width, height);
                frame.blit(from, ox, oy, BlendOp::Copy);
                frame.blit(to, ix, iy, BlendOp::Copy);
                frame
            }
            Kind::Crossfade => match self.in_out {
                InOut::In => Frame::mix(from, to, t),
                InOut::Out => Frame::mix(to, from, t),
            },
            Kind::DontMove | Kind::Grouped { .. } => to.clone(),
        }
    }
}

/// Position of a frame `prog` of the way from its resting place
fn offset(direction: Direction, prog: f32, width: usize, height: usize) -> (i32, i32) {
    let w = (prog * width as f32).round() as i32;
    let h = (prog * height as f32).round() as i32;
    match direction {
        Direction::North => (0, h),
        Direction::South => (0, -h),
        Direction::East => (-w, 0),
        Direction::West => (w, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn frames() -> (Frame, Frame) {
        (Frame::filled(8, 4, 3), Frame::filled(8, 4, 12))
    }

    fn counter() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
        let count = Rc::new(Cell::new(0));
        let handle = count.clone();
        (count, move || handle.set(handle.get() + 1))
    }

    #[test]
    fn test_not_started_holds() {
        let (from, to) = frames();
        let mut t = Transition::crossfade().with_frames(4);
        assert_eq!(t.next_frame(&from, &to), from);
        assert_eq!(t.progress(), 0.0);
        assert_eq!(t.state(), TransitionState::NotStarted);
    }

    #[test]
    fn test_completes_once_then_inert() {
        let (from, to) = frames();
        let (count, handler) = counter();
        let mut t = Transition::crossfade().with_frames(4).on_complete(handler);
        t.start();
        for _ in 0..3 {
            t.next_frame(&from, &to);
            assert!(t.is_running());
        }
        assert_eq!(t.next_frame(&from, &to), to);
        assert!(t.is_completed());
        for _ in 0..10 {
            assert_eq!(t.next_frame(&from, &to), to);
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_slide_in_starts_offscreen() {
        let (from, to) = frames();
        let mut t = Transition::slide(Direction::West).with_frames(2);
        t.start();
        let mid = t.next_frame(&from, &to);
        // Halfway: left half black, right half incoming.
        assert_eq!(mid.get(0, 0), 0);
        assert_eq!(mid.get(4, 0), 12);
        assert_eq!(t.next_frame(&from, &to), to);
    }

    #[test]
    fn test_slide_out_ends_blank() {
        let (from, to) = frames();
        let mut t = Transition::slide(Direction::North)
            .with_frames(2)
            .with_in_out(InOut::Out);
        t.start();
        t.next_frame(&from, &to);
        assert!(t.next_frame(&from, &to).is_blank());
    }

    #[test]
    fn test_push_moves_both() {
        let (from, to) = frames();
        let mut t = Transition::push(Direction::East).with_frames(2);
        t.start();
        let mid = t.next_frame(&from, &to);
        assert_eq!(mid.get(0, 0), 12);
        assert_eq!(mid.get(7, 0), 3);
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(matches!(
            Transition::grouped(Vec::new()),
            Err(PfError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_group_runs_parts_in_order() {
        let (from, to) = frames();
        let (a_done, a) = counter();
        let (b_done, b) = counter();
        let (c_done, c) = counter();
        let (group_done, g) = counter();
        let mut group = Transition::grouped(vec![
            Transition::dont_move().with_frames(2).on_complete(a),
            Transition::dont_move().with_frames(3).on_complete(b),
            Transition::crossfade().with_frames(2).on_complete(c),
        ])
        .unwrap()
        .on_complete(g);

        group.start();
        let mut frames_run = 0;
        while !group.is_completed() && frames_run < 100 {
            group.next_frame(&from, &to);
            frames_run += 1;
            if c_done.get() == 0 {
                assert_eq!(group_done.get(), 0);
            }
        }
        assert_eq!(frames_run, 7);
        assert_eq!((a_done.get(), b_done.get(), c_done.get()), (1, 1, 1));
        assert_eq!(group_done.get(), 1);

        for _ in 0..5 {
            group.next_frame(&from, &to);
        }
        assert_eq!(group_done.get(), 1);
    }

    #[test]
    fn test_restart_allows_new_completion() {
        let (from, to) = frames();
        let (count, handler) = counter();
        let mut t = Transition::dont_move().with_frames(1).on_complete(handler);
        t.start();
        t.next_frame(&from, &to);
        t.start();
        assert_eq!(t.current_part(), None);
        t.next_frame(&from, &to);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [Easing::Linear, Easing::EaseInQuad, Easing::EaseOutQuad, Easing::SCurve] {
            approx::assert_abs_diff_eq!(easing.apply(0.0), 0.0, epsilon = 1e-6);
            approx::assert_abs_diff_eq!(easing.apply(1.0), 1.0, epsilon = 1e-6);
        }
    }
}
