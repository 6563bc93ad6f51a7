//! Built-in visual programs.
//!
//! | Name          | Live keys                                  |
//! |---------------|--------------------------------------------|
//! | `clock`       | `color`, `show_seconds`                    |
//! | `scroll_text` | `text`, `color`, `speed`, `fps`            |
//! | `stars`       | `spawn_rate`, `lifetime`, `fps`            |
//!
//! Every program draws into an offscreen [`FrameBuffer`] and makes it visible
//! with [`DisplaySurface::commit`].  Keys a program does not know are kept in
//! its configuration without effect.
//!
//! [`FrameBuffer`]: retroboard_core::FrameBuffer
//! [`DisplaySurface::commit`]: retroboard_core::DisplaySurface::commit

pub mod clock;
pub mod scroll_text;
pub mod stars;
pub mod text;

use std::time::Duration;

use serde_json::Value;

use retroboard_core::{Program, ProgramConfig, ProgramRegistry, Rgb, SetupError};

/// Registers every built-in program.
pub fn register_builtin(registry: &mut ProgramRegistry) {
    registry
        .register(clock::NAME, |ctx| Box::new(clock::Clock::new(ctx)) as Box<dyn Program>)
        .register(scroll_text::NAME, |ctx| {
            Box::new(scroll_text::ScrollText::new(ctx)) as Box<dyn Program>
        })
        .register(stars::NAME, |ctx| Box::new(stars::Stars::new(ctx)) as Box<dyn Program>);
}

/// A registry holding just the built-in programs.
pub fn builtin_registry() -> ProgramRegistry {
    let mut registry = ProgramRegistry::new();
    register_builtin(&mut registry);
    registry
}

// ── Config value helpers ──────────────────────────────────────────────────────

fn invalid(key: &str, reason: &str) -> SetupError {
    SetupError::InvalidConfig {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Reads an `[r, g, b]` color, or `default` when the key is absent.
pub(crate) fn color_setting(
    config: &ProgramConfig,
    key: &str,
    default: Rgb,
) -> Result<Rgb, SetupError> {
    match config.get(key) {
        None => Ok(default),
        Some(value) => {
            Rgb::from_value(value).ok_or_else(|| invalid(key, "expected [r, g, b]"))
        }
    }
}

/// Reads a number strictly greater than zero.
pub(crate) fn positive_setting(
    config: &ProgramConfig,
    key: &str,
    default: f64,
) -> Result<f64, SetupError> {
    match config.get(key) {
        None => Ok(default),
        Some(value) => positive(value).ok_or_else(|| invalid(key, "expected a positive number")),
    }
}

/// Reads a non-negative integer.
pub(crate) fn count_setting(
    config: &ProgramConfig,
    key: &str,
    default: u64,
) -> Result<u64, SetupError> {
    match config.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| invalid(key, "expected a non-negative integer")),
    }
}

pub(crate) fn bool_setting(
    config: &ProgramConfig,
    key: &str,
    default: bool,
) -> Result<bool, SetupError> {
    match config.get(key) {
        None => Ok(default),
        Some(value) => value.as_bool().ok_or_else(|| invalid(key, "expected true or false")),
    }
}

pub(crate) fn positive(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite() && *v > 0.0)
}

/// Time between frames for a frame rate in frames per second.
pub(crate) fn frame_interval(fps: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / fps).unwrap_or(Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(key: &str, value: Value) -> ProgramConfig {
        let mut config = ProgramConfig::new();
        config.insert(key.to_string(), value);
        config
    }

    #[test]
    fn test_builtin_registry_contains_all_programs() {
        let registry = builtin_registry();
        assert_eq!(
            registry.names(),
            vec![
                "clock".to_string(),
                "scroll_text".to_string(),
                "stars".to_string()
            ]
        );
    }

    #[test]
    fn test_color_setting() {
        let empty = ProgramConfig::new();
        assert_eq!(color_setting(&empty, "color", Rgb::WHITE), Ok(Rgb::WHITE));
        assert_eq!(
            color_setting(&config("color", json!([1, 2, 3])), "color", Rgb::WHITE),
            Ok(Rgb::new(1, 2, 3))
        );
        assert!(color_setting(&config("color", json!("red")), "color", Rgb::WHITE).is_err());
    }

    #[test]
    fn test_positive_setting_rejects_zero_and_negative() {
        assert_eq!(positive_setting(&config("fps", json!(30)), "fps", 1.0), Ok(30.0));
        assert!(positive_setting(&config("fps", json!(0)), "fps", 1.0).is_err());
        assert!(positive_setting(&config("fps", json!(-2.5)), "fps", 1.0).is_err());
    }

    #[test]
    fn test_count_and_bool_settings() {
        assert_eq!(count_setting(&config("n", json!(3)), "n", 1), Ok(3));
        assert!(count_setting(&config("n", json!(-3)), "n", 1).is_err());
        assert_eq!(bool_setting(&ProgramConfig::new(), "b", true), Ok(true));
        assert!(bool_setting(&config("b", json!(1)), "b", true).is_err());
    }

    #[test]
    fn test_frame_interval_from_fps() {
        assert_eq!(frame_interval(50.0), Duration::from_millis(20));
    }
}
