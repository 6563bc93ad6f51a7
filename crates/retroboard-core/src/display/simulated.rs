//! In-memory display surface.
//!
//! Keeps the visible frame in a [`FrameBuffer`] instead of driving hardware.
//! Used by the server when no hardware driver is configured and by tests that
//! need to observe what a program drew.

use tracing::warn;

use super::{DisplaySurface, FrameBuffer, Rgb};
use crate::domain::settings::MAX_BRIGHTNESS;

/// A display surface backed by memory.
#[derive(Debug, Clone)]
pub struct SimulatedSurface {
    front: FrameBuffer,
    brightness: u8,
    commits: u64,
}

impl SimulatedSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            front: FrameBuffer::new(width, height),
            brightness: MAX_BRIGHTNESS,
            commits: 0,
        }
    }

    /// The frame currently visible.
    pub fn front(&self) -> &FrameBuffer {
        &self.front
    }

    /// Number of successful buffer swaps since creation.
    pub fn commits(&self) -> u64 {
        self.commits
    }
}

impl DisplaySurface for SimulatedSurface {
    fn width(&self) -> usize {
        self.front.width()
    }

    fn height(&self) -> usize {
        self.front.height()
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        self.front.set_pixel(x, y, color);
    }

    fn clear(&mut self) {
        self.front.clear();
    }

    fn fill(&mut self, color: Rgb) {
        self.front.fill(color);
    }

    fn commit(&mut self, buffer: FrameBuffer) -> FrameBuffer {
        if buffer.width() != self.front.width() || buffer.height() != self.front.height() {
            warn!(
                expected_width = self.front.width(),
                expected_height = self.front.height(),
                width = buffer.width(),
                height = buffer.height(),
                "rejecting commit of mismatched frame buffer"
            );
            return buffer;
        }
        self.commits += 1;
        std::mem::replace(&mut self.front, buffer)
    }

    fn brightness(&self) -> u8 {
        self.brightness
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness.min(MAX_BRIGHTNESS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_swaps_and_returns_previous_frame() {
        // Arrange
        let mut surface = SimulatedSurface::new(3, 2);
        surface.set_pixel(0, 0, Rgb::WHITE);
        let mut offscreen = surface.create_offscreen_buffer();
        offscreen.fill(Rgb::new(9, 9, 9));

        // Act
        let previous = surface.commit(offscreen);

        // Assert
        assert_eq!(surface.front().lit_pixels(), 6);
        assert_eq!(previous.pixel(0, 0), Some(Rgb::WHITE));
        assert_eq!(previous.lit_pixels(), 1);
        assert_eq!(surface.commits(), 1);
    }

    #[test]
    fn test_commit_rejects_mismatched_buffer() {
        let mut surface = SimulatedSurface::new(3, 2);
        let mut wrong = FrameBuffer::new(5, 5);
        wrong.fill(Rgb::WHITE);

        let returned = surface.commit(wrong);

        assert_eq!(returned.width(), 5);
        assert_eq!(surface.front().lit_pixels(), 0);
        assert_eq!(surface.commits(), 0);
    }

    #[test]
    fn test_brightness_defaults_to_full_and_is_clamped() {
        let mut surface = SimulatedSurface::new(1, 1);
        assert_eq!(surface.brightness(), 100);
        surface.set_brightness(150);
        assert_eq!(surface.brightness(), 100);
        surface.set_brightness(30);
        assert_eq!(surface.brightness(), 30);
    }

    #[test]
    fn test_clear_blanks_visible_frame() {
        let mut surface = SimulatedSurface::new(2, 2);
        surface.fill(Rgb::WHITE);
        surface.clear();
        assert_eq!(surface.front().lit_pixels(), 0);
    }
}
