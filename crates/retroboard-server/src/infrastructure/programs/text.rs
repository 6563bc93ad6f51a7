//! Text rendering shared by the built-in programs.
//!
//! Uses the `embedded-graphics` 5×8 ASCII font, drawn top-left anchored.

use embedded_graphics::mono_font::ascii::FONT_5X8;
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};

use retroboard_core::{FrameBuffer, Rgb};

pub const FONT: &MonoFont<'static> = &FONT_5X8;

/// Height in pixels of one line of text.
pub const LINE_HEIGHT: i32 = FONT_5X8.character_size.height as i32;

/// Width in pixels of `text` when drawn with [`draw_text`].
pub fn text_width(text: &str) -> i32 {
    let advance = FONT.character_size.width + FONT.character_spacing;
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX / advance);
    let width = (chars * advance).saturating_sub(FONT.character_spacing);
    i32::try_from(width).unwrap_or(i32::MAX)
}

/// Draws `text` with its top-left corner at `(x, y)`.  Pixels outside the
/// buffer are skipped.
pub fn draw_text(buffer: &mut FrameBuffer, x: i32, y: i32, text: &str, color: Rgb) {
    let style = MonoTextStyle::new(FONT, Rgb888::from(color));
    match Text::with_baseline(text, Point::new(x, y), style, Baseline::Top).draw(buffer) {
        Ok(_) => {}
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width(""), 0);
        assert_eq!(text_width("1"), 5);
        assert_eq!(text_width("12:34"), 25);
    }

    #[test]
    fn test_draw_text_stays_inside_its_cell() {
        // Arrange
        let mut buffer = FrameBuffer::new(10, 10);

        // Act
        draw_text(&mut buffer, 0, 0, "1", Rgb::WHITE);

        // Assert
        assert!(buffer.lit_pixels() > 0);
        for y in 0..10 {
            for x in 0..10 {
                if x >= 5 || y >= LINE_HEIGHT {
                    assert_eq!(buffer.pixel(x, y), Some(Rgb::BLACK), "pixel ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_text_uses_the_requested_colour_only() {
        let mut buffer = FrameBuffer::new(16, 8);

        draw_text(&mut buffer, 0, 0, "ok", Rgb::new(0, 255, 0));

        assert!(buffer
            .pixels()
            .iter()
            .all(|p| *p == Rgb::BLACK || *p == Rgb::new(0, 255, 0)));
    }

    #[test]
    fn test_fully_offscreen_text_draws_nothing() {
        let mut buffer = FrameBuffer::new(8, 8);

        draw_text(&mut buffer, -20, 0, "abc", Rgb::WHITE);
        draw_text(&mut buffer, 8, 0, "abc", Rgb::WHITE);

        assert_eq!(buffer.lit_pixels(), 0);
    }

    #[test]
    fn test_punctuation_has_distinct_glyphs() {
        let mut hash = FrameBuffer::new(5, 8);
        let mut at = FrameBuffer::new(5, 8);

        draw_text(&mut hash, 0, 0, "#", Rgb::WHITE);
        draw_text(&mut at, 0, 0, "@", Rgb::WHITE);

        assert!(hash.lit_pixels() > 0);
        assert_ne!(hash, at);
    }
}
