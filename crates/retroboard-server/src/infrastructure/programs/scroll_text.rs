//! Text scrolling right to left across the display.

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use retroboard_core::{
    DisplaySurface, FrameBuffer, Program, ProgramConfig, ProgramContext, Rgb, RuntimeError,
    SetupError,
};

use super::text::{self, LINE_HEIGHT};
use super::{color_setting, count_setting, frame_interval, positive, positive_setting};

pub const NAME: &str = "scroll_text";

const DEFAULT_TEXT: &str = "Hello, World!";
const DEFAULT_FPS: f64 = 30.0;

pub struct ScrollText {
    config: ProgramConfig,
    width: i32,
    height: i32,
    text: String,
    text_width: i32,
    color: Rgb,
    /// Pixels moved per frame.
    speed: i32,
    interval: Duration,
    x: i32,
    back: Option<FrameBuffer>,
}

impl ScrollText {
    pub fn new(context: ProgramContext) -> Self {
        let width = i32::try_from(context.width).unwrap_or(i32::MAX);
        Self {
            config: context.config,
            width,
            height: i32::try_from(context.height).unwrap_or(i32::MAX),
            text: DEFAULT_TEXT.to_string(),
            text_width: text::text_width(DEFAULT_TEXT),
            color: Rgb::WHITE,
            speed: 1,
            interval: frame_interval(DEFAULT_FPS),
            x: width,
            back: None,
        }
    }

    fn set_text(&mut self, message: String) {
        self.text_width = text::text_width(&message);
        self.text = message;
    }
}

impl Program for ScrollText {
    fn setup(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SetupError> {
        let text = match self.config.get("text") {
            None => DEFAULT_TEXT.to_string(),
            Some(Value::String(text)) => text.clone(),
            Some(_) => {
                return Err(SetupError::InvalidConfig {
                    key: "text".to_string(),
                    reason: "expected a string".to_string(),
                })
            }
        };
        self.set_text(text);
        self.color = color_setting(&self.config, "color", Rgb::WHITE)?;
        let speed = count_setting(&self.config, "speed", 1)?;
        self.speed = i32::try_from(speed).unwrap_or(i32::MAX);
        self.interval = frame_interval(positive_setting(&self.config, "fps", DEFAULT_FPS)?);

        self.x = self.width;
        surface.clear();
        self.back = Some(surface.create_offscreen_buffer());
        Ok(())
    }

    fn advance(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), RuntimeError> {
        let mut frame = self
            .back
            .take()
            .unwrap_or_else(|| surface.create_offscreen_buffer());
        frame.clear();
        let y = (self.height - LINE_HEIGHT) / 2;
        text::draw_text(&mut frame, self.x, y, &self.text, self.color);
        self.back = Some(surface.commit(frame));

        self.x = self.x.saturating_sub(self.speed);
        if self.x < -self.text_width {
            self.x = self.width;
        }
        Ok(())
    }

    fn config(&self) -> ProgramConfig {
        self.config.clone()
    }

    fn update_config(&mut self, key: &str, value: Value) {
        match key {
            "text" => match value.as_str() {
                Some(text) => self.set_text(text.to_string()),
                None => warn!(key, "ignoring non-string text"),
            },
            "color" => match Rgb::from_value(&value) {
                Some(color) => self.color = color,
                None => warn!(key, "ignoring invalid color"),
            },
            "speed" => match value.as_u64().and_then(|s| i32::try_from(s).ok()) {
                Some(speed) => self.speed = speed,
                None => warn!(key, "ignoring invalid speed"),
            },
            "fps" => match positive(&value) {
                Some(fps) => self.interval = frame_interval(fps),
                None => warn!(key, "ignoring non-positive fps"),
            },
            _ => {}
        }
        self.config.insert(key.to_string(), value);
    }

    fn frame_interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroboard_core::{SimulatedSurface, StopHandle};
    use serde_json::json;

    fn scroller(pairs: &[(&str, Value)]) -> ScrollText {
        let (_handle, stop) = StopHandle::pair();
        ScrollText::new(ProgramContext {
            width: 16,
            height: 8,
            config: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            stop,
        })
    }

    #[test]
    fn test_text_enters_from_the_right_edge() {
        // Arrange
        let mut surface = SimulatedSurface::new(16, 8);
        let mut program = scroller(&[("text", json!("I")), ("speed", json!(4))]);
        program.setup(&mut surface).expect("setup");

        // Act: first frame is drawn just off screen
        program.advance(&mut surface).expect("advance");
        assert_eq!(surface.front().lit_pixels(), 0);
        program.advance(&mut surface).expect("advance");

        // Assert: now at x = 12, so most of the glyph is visible
        assert!(surface.front().lit_pixels() > 0);
    }

    #[test]
    fn test_position_wraps_after_text_leaves() {
        let mut surface = SimulatedSurface::new(16, 8);
        let mut program = scroller(&[("text", json!("AB")), ("speed", json!(4))]);
        program.setup(&mut surface).expect("setup");

        // Seven steps of 4 reach -12, past the 10-pixel text width.
        for _ in 0..7 {
            program.advance(&mut surface).expect("advance");
        }

        assert_eq!(program.x, 16);
    }

    #[test]
    fn test_fps_sets_frame_interval() {
        let mut surface = SimulatedSurface::new(16, 8);
        let mut program = scroller(&[("fps", json!(10))]);
        program.setup(&mut surface).expect("setup");
        assert_eq!(program.frame_interval(), Duration::from_millis(100));

        program.update_config("fps", json!(20));
        assert_eq!(program.frame_interval(), Duration::from_millis(50));

        program.update_config("fps", json!(0));
        assert_eq!(program.frame_interval(), Duration::from_millis(50));
        assert_eq!(program.config()["fps"], json!(0));
    }

    #[test]
    fn test_update_text_recomputes_width() {
        let mut program = scroller(&[]);
        program.update_config("text", json!("12345"));
        assert_eq!(program.text, "12345");
        assert_eq!(program.text_width, 25);
    }

    #[test]
    fn test_non_string_text_fails_setup() {
        let mut surface = SimulatedSurface::new(16, 8);
        let mut program = scroller(&[("text", json!(42))]);
        assert!(program.setup(&mut surface).is_err());
    }

    #[test]
    fn test_default_cleanup_clears_surface() {
        let mut surface = SimulatedSurface::new(16, 8);
        let mut program = scroller(&[("text", json!("XXXX"))]);
        program.setup(&mut surface).expect("setup");
        for _ in 0..6 {
            program.advance(&mut surface).expect("advance");
        }
        assert!(surface.front().lit_pixels() > 0);

        program.cleanup(&mut surface);

        assert_eq!(surface.front().lit_pixels(), 0);
    }
}
