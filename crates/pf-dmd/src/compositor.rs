//! Compositor
//!
//! "Topmost opaque wins": layers are captured top-down until the first
//! opaque one. That layer is copied as the base and every captured layer
//! above it is drawn over it with its own blend op. No alpha blending.

use pf_core::Timestamp;

use crate::{BlendOp, Frame, Layer};

/// A layer's frame for one tick, with its placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFrame {
    pub frame: Frame,
    pub x: i32,
    pub y: i32,
    pub op: BlendOp,
}

impl LayerFrame {
    /// Pull the layer's next frame; opaque layers draw with `Copy`
    pub fn capture(layer: &mut Layer, now: Timestamp) -> Option<Self> {
        let frame = layer.next_frame(now)?;
        Some(Self {
            frame,
            x: layer.x,
            y: layer.y,
            op: if layer.opaque { BlendOp::Copy } else { layer.op },
        })
    }

    pub fn draw_onto(&self, dst: &mut Frame) {
        dst.blit(&self.frame, self.x, self.y, self.op);
    }
}

/// Merges captured layer frames into the display frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compositor {
    width: usize,
    height: usize,
}

impl Compositor {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn blank(&self) -> Frame {
        Frame::new(self.width, self.height)
    }

    /// Compose frames listed top-down. The caller stops capturing at the
    /// first opaque layer, so the last entry is the base.
    pub fn compose(&self, top_down: &[LayerFrame]) -> Frame {
        let mut out = self.blank();
        for layer in top_down.iter().rev() {
            layer.draw_onto(&mut out);
        }
        out
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(128, 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose_layers;

    fn solid(value: u8) -> Layer {
        Layer::frame(Frame::filled(4, 2, value))
    }

    #[test]
    fn test_topmost_opaque_hides_below() {
        let compositor = Compositor::new(4, 2);
        let mut top = Layer::frame({
            let mut f = Frame::new(4, 2);
            f.set(0, 0, 9);
            f
        });
        let mut middle = solid(4).opaque();
        let mut bottom = solid(15).opaque();

        let frame = compose_layers(
            &compositor,
            [&mut top, &mut middle, &mut bottom],
            Timestamp::ZERO,
        );
        assert_eq!(frame.get(0, 0), 9);
        assert_eq!(frame.get(1, 0), 4);
        assert_eq!(frame.get(3, 1), 4);
    }

    #[test]
    fn test_opaque_layer_without_frame_still_blocks() {
        let compositor = Compositor::new(4, 2);
        let mut top = Layer::empty().opaque();
        let mut bottom = solid(15);
        let frame = compose_layers(&compositor, [&mut top, &mut bottom], Timestamp::ZERO);
        assert!(frame.is_blank());
    }

    #[test]
    fn test_transparent_layers_overlay() {
        let compositor = Compositor::new(4, 2);
        let mut dot = Frame::new(2, 1);
        dot.set(1, 0, 7);
        let mut top = Layer::frame(dot).at(2, 1);
        let mut bottom = solid(2);
        let frame = compose_layers(&compositor, [&mut top, &mut bottom], Timestamp::ZERO);
        assert_eq!(frame.get(3, 1), 7);
        assert_eq!(frame.get(2, 1), 2);
    }

    #[test]
    fn test_empty_stack_is_blank() {
        let compositor = Compositor::new(4, 2);
        assert!(compositor.compose(&[]).is_blank());
    }
}
