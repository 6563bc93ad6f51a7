//! Display surface contract and frame buffers.
//!
//! A display surface is the single canonical pixel buffer shown on the
//! matrix.  Programs can draw on it directly, but smooth animation uses
//! double-buffering:
//!
//! ```text
//! let mut frame = surface.create_offscreen_buffer();
//! loop {
//!     frame.clear();
//!     frame.set_pixel(10, 10, Rgb::new(255, 0, 0));
//!     frame = surface.commit(frame);   // swap, get the old buffer back
//! }
//! ```
//!
//! `commit` takes the buffer by value and hands the previous one back, so the
//! swap can never be observed half-done and no buffer is ever aliased.

pub mod simulated;

use std::convert::Infallible;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::Pixel;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use simulated::SimulatedSurface;

/// An 8-bit-per-channel colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scales every channel by `factor`, clamped to `0.0..=1.0`.
    pub fn scale(self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let channel = |c: u8| (f32::from(c) * factor).round() as u8;
        Self::new(channel(self.r), channel(self.g), channel(self.b))
    }

    /// Parses a colour from a configuration value of the form `[r, g, b]`.
    ///
    /// Channels outside `0..=255` are clamped.  Anything else yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        if items.len() != 3 {
            return None;
        }
        let channel = |v: &Value| v.as_i64().map(|c| c.clamp(0, 255) as u8);
        Some(Self::new(
            channel(&items[0])?,
            channel(&items[1])?,
            channel(&items[2])?,
        ))
    }
}

/// A width × height grid of pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl FrameBuffer {
    /// Creates an all-black buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb::BLACK; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sets one pixel.  Coordinates outside the buffer are ignored so that
    /// programs can draw partially visible shapes without bounds checks.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        if let Some(idx) = self.index(x, y) {
            self.pixels[idx] = color;
        }
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb> {
        self.index(x, y).map(|idx| self.pixels[idx])
    }

    pub fn clear(&mut self) {
        self.fill(Rgb::BLACK);
    }

    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    /// All pixels, row-major.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Number of pixels that are not black.
    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().filter(|p| **p != Rgb::BLACK).count()
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}

impl From<Rgb888> for Rgb {
    fn from(color: Rgb888) -> Self {
        Self::new(color.r(), color.g(), color.b())
    }
}

impl From<Rgb> for Rgb888 {
    fn from(color: Rgb) -> Self {
        Rgb888::new(color.r, color.g, color.b)
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(
            u32::try_from(self.width).unwrap_or(u32::MAX),
            u32::try_from(self.height).unwrap_or(u32::MAX),
        )
    }
}

/// Lets `embedded-graphics` primitives and fonts render into a frame.
impl DrawTarget for FrameBuffer {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color.into());
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.into());
        Ok(())
    }
}

/// The pixel-addressable display a program draws on.
///
/// Implemented by display drivers (hardware or simulated).  The manager owns
/// the surface and lends it to the active program for each lifecycle call, so
/// no other component can address it while a program runs.
pub trait DisplaySurface: Send {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Sets one pixel of the visible frame.  Out-of-range coordinates are
    /// ignored.
    fn set_pixel(&mut self, x: i32, y: i32, color: Rgb);

    /// Sets every pixel of the visible frame to black.
    fn clear(&mut self);

    /// Sets every pixel of the visible frame to `color`.
    fn fill(&mut self, color: Rgb);

    /// Creates an offscreen buffer with the surface's dimensions.
    fn create_offscreen_buffer(&self) -> FrameBuffer {
        FrameBuffer::new(self.width(), self.height())
    }

    /// Makes `buffer` the visible frame and returns the previously visible
    /// one for reuse.
    fn commit(&mut self, buffer: FrameBuffer) -> FrameBuffer;

    /// Current brightness in percent.
    fn brightness(&self) -> u8;

    /// Sets brightness in percent; values above 100 are clamped.
    fn set_brightness(&mut self, brightness: u8);
}
