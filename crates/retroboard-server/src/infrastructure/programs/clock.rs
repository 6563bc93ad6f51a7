//! Digital clock showing local time as `HH:MM:SS` (or `HH:MM`).
//!
//! Redraws only when the displayed text changes.  Falls back to UTC when the
//! local offset cannot be determined.

use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::warn;

use retroboard_core::{
    DisplaySurface, FrameBuffer, Program, ProgramConfig, ProgramContext, Rgb, RuntimeError,
    SetupError, StopSignal,
};

use super::text::{self, LINE_HEIGHT};
use super::{bool_setting, color_setting};

pub const NAME: &str = "clock";

const TICK: Duration = Duration::from_millis(100);

pub struct Clock {
    config: ProgramConfig,
    color: Rgb,
    show_seconds: bool,
    back: Option<FrameBuffer>,
    shown: Option<String>,
    stop: StopSignal,
}

impl Clock {
    pub fn new(context: ProgramContext) -> Self {
        Self {
            config: context.config,
            color: Rgb::WHITE,
            show_seconds: true,
            back: None,
            shown: None,
            stop: context.stop,
        }
    }

    /// Draws `label` unless it is already on screen.
    fn show(&mut self, surface: &mut dyn DisplaySurface, label: String) {
        if self.shown.as_deref() == Some(label.as_str()) {
            return;
        }
        let mut frame = self
            .back
            .take()
            .unwrap_or_else(|| surface.create_offscreen_buffer());
        frame.clear();

        let width = i32::try_from(frame.width()).unwrap_or(i32::MAX);
        let height = i32::try_from(frame.height()).unwrap_or(i32::MAX);
        let x = (width - text::text_width(&label)) / 2;
        let y = (height - LINE_HEIGHT) / 2;
        text::draw_text(&mut frame, x, y, &label, self.color);

        self.back = Some(surface.commit(frame));
        self.shown = Some(label);
    }
}

/// Formats a wall-clock time the way the clock displays it.
pub fn clock_text(hour: u8, minute: u8, second: u8, show_seconds: bool) -> String {
    if show_seconds {
        format!("{hour:02}:{minute:02}:{second:02}")
    } else {
        format!("{hour:02}:{minute:02}")
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

impl Program for Clock {
    fn setup(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SetupError> {
        self.color = color_setting(&self.config, "color", Rgb::WHITE)?;
        self.show_seconds = bool_setting(&self.config, "show_seconds", true)?;
        surface.clear();
        self.back = Some(surface.create_offscreen_buffer());
        self.shown = None;
        Ok(())
    }

    fn advance(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), RuntimeError> {
        if self.stop.is_raised() {
            return Ok(());
        }
        let now = now();
        let text = clock_text(now.hour(), now.minute(), now.second(), self.show_seconds);
        self.show(surface, text);
        Ok(())
    }

    fn config(&self) -> ProgramConfig {
        self.config.clone()
    }

    fn update_config(&mut self, key: &str, value: Value) {
        match key {
            "color" => match Rgb::from_value(&value) {
                Some(color) => self.color = color,
                None => warn!(key, "ignoring invalid color"),
            },
            "show_seconds" => match value.as_bool() {
                Some(flag) => self.show_seconds = flag,
                None => warn!(key, "ignoring non-boolean value"),
            },
            _ => {}
        }
        self.config.insert(key.to_string(), value);
        self.shown = None;
    }

    fn frame_interval(&self) -> Duration {
        TICK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroboard_core::{SimulatedSurface, StopHandle};
    use serde_json::json;

    fn clock(config: ProgramConfig) -> (Clock, StopHandle) {
        let (handle, stop) = StopHandle::pair();
        let clock = Clock::new(ProgramContext {
            width: 64,
            height: 32,
            config,
            stop,
        });
        (clock, handle)
    }

    #[test]
    fn test_clock_text_formats() {
        assert_eq!(clock_text(9, 5, 7, true), "09:05:07");
        assert_eq!(clock_text(23, 59, 0, false), "23:59");
    }

    #[test]
    fn test_advance_draws_time_to_surface() {
        // Arrange
        let mut surface = SimulatedSurface::new(64, 32);
        let (mut program, _handle) = clock(ProgramConfig::new());
        program.setup(&mut surface).expect("setup");

        // Act
        program.advance(&mut surface).expect("advance");

        // Assert
        assert!(surface.front().lit_pixels() > 0);
        assert_eq!(surface.commits(), 1);
    }

    #[test]
    fn test_unchanged_time_is_not_redrawn() {
        let mut surface = SimulatedSurface::new(64, 32);
        let (mut program, _handle) = clock(ProgramConfig::new());
        program.setup(&mut surface).expect("setup");

        program.show(&mut surface, "12:00:00".to_string());
        program.show(&mut surface, "12:00:00".to_string());
        assert_eq!(surface.commits(), 1);

        program.show(&mut surface, "12:00:01".to_string());
        assert_eq!(surface.commits(), 2);
    }

    #[test]
    fn test_invalid_color_fails_setup() {
        let mut surface = SimulatedSurface::new(64, 32);
        let (mut program, _handle) = clock(
            [("color".to_string(), json!("blue"))]
                .into_iter()
                .collect(),
        );

        let err = program.setup(&mut surface).expect_err("invalid color");

        assert!(matches!(err, SetupError::InvalidConfig { .. }));
    }

    #[test]
    fn test_update_config_applies_color_and_stores_key() {
        let mut surface = SimulatedSurface::new(64, 32);
        let (mut program, _handle) = clock(ProgramConfig::new());
        program.setup(&mut surface).expect("setup");

        program.update_config("color", json!([255, 0, 0]));
        program.update_config("font", json!("tom-thumb"));
        program.advance(&mut surface).expect("advance");

        assert_eq!(program.color, Rgb::new(255, 0, 0));
        assert_eq!(program.config()["font"], json!("tom-thumb"));
        assert!(surface
            .front()
            .pixels()
            .iter()
            .all(|p| *p == Rgb::BLACK || *p == Rgb::new(255, 0, 0)));
    }

    #[test]
    fn test_raised_stop_signal_skips_drawing() {
        let mut surface = SimulatedSurface::new(64, 32);
        let (mut program, handle) = clock(ProgramConfig::new());
        program.setup(&mut surface).expect("setup");
        handle.raise();

        program.advance(&mut surface).expect("advance");

        assert_eq!(surface.commits(), 0);
    }
}
