//! Placeholder fonts
//!
//! Real machines ship bitmap font assets; the rules only need something
//! that measures and draws text. [`BlockFont`] is a built-in 3x5 glyph set
//! scaled by an integer factor.

use crate::{Frame, MAX_DOT};

/// Measures and draws text into frames
pub trait Font {
    /// Size in dots of `text` rendered on one line
    fn measure(&self, text: &str) -> (usize, usize);

    /// Draw `text` with its top-left corner at (x, y)
    fn draw(&self, frame: &mut Frame, text: &str, x: i32, y: i32, value: u8);

    fn line_height(&self) -> usize;
}

const GLYPH_W: usize = 3;
const GLYPH_H: usize = 5;

/// Scaled 3x5 block font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFont {
    scale: usize,
    spacing: usize,
}

impl BlockFont {
    pub fn new(scale: usize) -> Self {
        let scale = scale.max(1);
        Self {
            scale,
            spacing: scale,
        }
    }

    /// 3x5 dots, the bottom status line size
    pub fn tiny() -> Self {
        Self::new(1)
    }

    /// 6x10 dots, headline size
    pub fn large() -> Self {
        Self::new(2)
    }

    #[inline]
    fn advance(&self) -> usize {
        GLYPH_W * self.scale + self.spacing
    }
}

impl Default for BlockFont {
    fn default() -> Self {
        Self::tiny()
    }
}

impl Font for BlockFont {
    fn measure(&self, text: &str) -> (usize, usize) {
        let chars = text.chars().count();
        if chars == 0 {
            return (0, self.line_height());
        }
        (chars * self.advance() - self.spacing, self.line_height())
    }

    fn draw(&self, frame: &mut Frame, text: &str, x: i32, y: i32, value: u8) {
        let value = value.min(MAX_DOT);
        let mut cursor = x;
        for ch in text.chars() {
            let rows = glyph(ch);
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_W {
                    if bits & (0b100 >> col) == 0 {
                        continue;
                    }
                    frame.fill_rect(
                        cursor + (col * self.scale) as i32,
                        y + (row * self.scale) as i32,
                        self.scale,
                        self.scale,
                        value,
                    );
                }
            }
            cursor += self.advance() as i32;
        }
    }

    fn line_height(&self) -> usize {
        GLYPH_H * self.scale
    }
}

/// Row bitmaps, MSB = left column
fn glyph(ch: char) -> [u8; GLYPH_H] {
    match ch.to_ascii_uppercase() {
        ' ' => [0, 0, 0, 0, 0],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b011, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '?' => [0b110, 0b001, 0b010, 0b000, 0b010],
        '.' => [0, 0, 0, 0, 0b010],
        ',' => [0, 0, 0, 0b010, 0b100],
        ':' => [0, 0b010, 0, 0b010, 0],
        '-' => [0, 0, 0b111, 0, 0],
        '+' => [0, 0b010, 0b111, 0b010, 0],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '\'' => [0b010, 0b010, 0, 0, 0],
        _ => [0b111, 0b111, 0b111, 0b111, 0b111],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure() {
        let font = BlockFont::tiny();
        assert_eq!(font.measure("AB"), (7, 5));
        assert_eq!(font.measure(""), (0, 5));
        assert_eq!(BlockFont::large().measure("A"), (6, 10));
    }

    #[test]
    fn test_draw_one() {
        let font = BlockFont::tiny();
        let mut frame = Frame::new(8, 8);
        font.draw(&mut frame, "1", 0, 0, 15);
        assert_eq!(frame.get(1, 0), 15);
        assert_eq!(frame.get(0, 0), 0);
        assert_eq!(frame.lit_count(), 8);
    }

    #[test]
    fn test_scaled_draw_fills_blocks() {
        let font = BlockFont::large();
        let mut frame = Frame::new(16, 16);
        font.draw(&mut frame, "-", 0, 0, 8);
        assert_eq!(frame.lit_count(), 3 * 4);
        assert_eq!(frame.get(0, 4), 8);
        assert_eq!(frame.get(5, 5), 8);
    }
}
