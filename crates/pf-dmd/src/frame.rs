//! Dot frames

use serde::{Deserialize, Serialize};

use crate::MAX_DOT;

/// How source dots combine with destination dots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendOp {
    /// Source replaces destination
    Copy,
    /// Non-zero source dots replace destination; black is transparent
    #[default]
    Overlay,
    /// Saturating add
    Add,
}

/// Rectangular grid of 4-bit dots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    width: usize,
    height: usize,
    dots: Vec<u8>,
}

impl Frame {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            dots: vec![0; width * height],
        }
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            dots: vec![value.min(MAX_DOT); width * height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Dot at (x, y); out of range reads as 0
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        if x < self.width && y < self.height {
            self.dots[y * self.width + x]
        } else {
            0
        }
    }

    /// Out of range writes are dropped
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.dots[y * self.width + x] = value.min(MAX_DOT);
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.dots.fill(value.min(MAX_DOT));
    }

    pub fn clear(&mut self) {
        self.dots.fill(0);
    }

    /// Fill a clipped rectangle
    pub fn fill_rect(&mut self, x: i32, y: i32, width: usize, height: usize, value: u8) {
        for dy in 0..height as i32 {
            for dx in 0..width as i32 {
                let (px, py) = (x + dx, y + dy);
                if px >= 0 && py >= 0 {
                    self.set(px as usize, py as usize, value);
                }
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        self.dots.iter().all(|&d| d == 0)
    }

    /// Number of lit dots
    pub fn lit_count(&self) -> usize {
        self.dots.iter().filter(|&&d| d != 0).count()
    }

    /// Draw `src` with its top-left corner at (x, y), clipped to this frame
    pub fn blit(&mut self, src: &Frame, x: i32, y: i32, op: BlendOp) {
        for sy in 0..src.height {
            let dy = y + sy as i32;
            if dy < 0 || dy >= self.height as i32 {
                continue;
            }
            for sx in 0..src.width {
                let dx = x + sx as i32;
                if dx < 0 || dx >= self.width as i32 {
                    continue;
                }
                let value = src.dots[sy * src.width + sx];
                let idx = dy as usize * self.width + dx as usize;
                match op {
                    BlendOp::Copy => self.dots[idx] = value,
                    BlendOp::Overlay => {
                        if value != 0 {
                            self.dots[idx] = value;
                        }
                    }
                    BlendOp::Add => self.dots[idx] = (self.dots[idx] + value).min(MAX_DOT),
                }
            }
        }
    }

    /// Per-dot linear mix; `t` = 0 gives `a`, 1 gives `b`
    pub fn mix(a: &Frame, b: &Frame, t: f32) -> Frame {
        let t = t.clamp(0.0, 1.0);
        let width = a.width.max(b.width);
        let height = a.height.max(b.height);
        let mut out = Frame::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let va = a.get(x, y) as f32;
                let vb = b.get(x, y) as f32;
                out.set(x, y, (va + (vb - va) * t).round() as u8);
            }
        }
        out
    }

    /// Coarse text rendering for logs and the simulator
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(match self.get(x, y) {
                    0 => ' ',
                    1..=7 => '.',
                    _ => '#',
                });
            }
            out.push('\n');
        }
        out
    }
}
