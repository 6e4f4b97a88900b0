//! Display helpers shared by the rule modes

use std::rc::Rc;

use pf_dmd::{BlockFont, Font, Frame, GroupedLayer, Justify, Layer, MAX_DOT, PanningLayer, TextLayer};

pub const DMD_WIDTH: usize = 128;
pub const DMD_HEIGHT: usize = 32;

/// Small font used for captions and the status line
pub fn small_font() -> Rc<dyn Font> {
    Rc::new(BlockFont::tiny())
}

/// Headline and score font
pub fn large_font() -> Rc<dyn Font> {
    Rc::new(BlockFont::large())
}

/// Full-width text centred on the display at row `y`
pub fn centered_text(font: Rc<dyn Font>, y: i32) -> TextLayer {
    TextLayer::new(font, DMD_WIDTH as i32 / 2, y, DMD_WIDTH, DMD_HEIGHT).justify(Justify::Center)
}

/// Opaque two-line card: a small caption over a large value
pub fn caption_card(caption: &str, value: &str) -> Layer {
    let mut top = centered_text(small_font(), 4);
    top.set_text(Some(caption), None);
    let mut bottom = centered_text(large_font(), 14);
    bottom.set_text(Some(value), None);
    Layer::grouped(GroupedLayer::new(
        DMD_WIDTH,
        DMD_HEIGHT,
        vec![Layer::text(top), Layer::text(bottom)],
    ))
    .opaque()
}

/// Opaque single line of small text across the middle of the display
pub fn banner(text: &str) -> Layer {
    let mut layer = centered_text(small_font(), 13);
    layer.set_text(Some(text), None);
    Layer::grouped(GroupedLayer::new(DMD_WIDTH, DMD_HEIGHT, vec![Layer::text(layer)])).opaque()
}

/// Display-wide frame with one centred line of small text per entry, for
/// panning credits and instructions
pub fn markup_frame(lines: &[&str]) -> Frame {
    let font = BlockFont::tiny();
    let line_height = font.line_height() + 2;
    let mut frame = Frame::new(DMD_WIDTH, (lines.len() * line_height).max(DMD_HEIGHT));
    for (row, line) in lines.iter().enumerate() {
        let (width, _) = font.measure(line);
        let x = (DMD_WIDTH as i32 - width as i32) / 2;
        font.draw(&mut frame, line, x, (row * line_height) as i32, MAX_DOT);
    }
    frame
}

/// `lines` scrolling up the display, one pixel every `ticks_per_move` frames
pub fn panning(lines: &[&str], ticks_per_move: u32) -> Layer {
    Layer::panning(
        PanningLayer::new(DMD_WIDTH, DMD_HEIGHT, markup_frame(lines), (0, 0), (0, 1))
            .with_ticks_per_move(ticks_per_move),
    )
    .opaque()
}

/// Points with thousands separators; zero shows as "00"
pub fn format_points(points: u64) -> String {
    if points == 0 {
        return "00".to_string();
    }
    let digits = points.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_points() {
        assert_eq!(format_points(0), "00");
        assert_eq!(format_points(999), "999");
        assert_eq!(format_points(1_000), "1,000");
        assert_eq!(format_points(15_000), "15,000");
        assert_eq!(format_points(1_234_567), "1,234,567");
    }

    #[test]
    fn test_markup_frame_grows_with_lines() {
        let short = markup_frame(&["CREDITS"]);
        assert_eq!(short.size(), (DMD_WIDTH, DMD_HEIGHT));
        let lines = ["LINE"; 20];
        let tall = markup_frame(&lines);
        assert!(tall.height() > DMD_HEIGHT);
        assert!(tall.lit_count() > short.lit_count());
    }

    #[test]
    fn test_caption_card_is_opaque_and_renders() {
        let mut card = caption_card("Skill Shot!", "5,000");
        assert!(card.opaque);
        let frame = card.next_frame(pf_core::Timestamp(0));
        assert!(frame.is_some_and(|f| f.lit_count() > 0));
    }
}
