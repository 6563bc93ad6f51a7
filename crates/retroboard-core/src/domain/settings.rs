//! Global display settings.

use serde::{Deserialize, Serialize};

/// Highest brightness value accepted by the display surface.
pub const MAX_BRIGHTNESS: u8 = 100;

/// Settings that apply to the display regardless of which program runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Display brightness in percent, always within `0..=100`.
    #[serde(default = "default_brightness")]
    pub brightness: u8,
}

fn default_brightness() -> u8 {
    MAX_BRIGHTNESS
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
        }
    }
}

impl GlobalSettings {
    /// Clamps an untrusted brightness value into `0..=100`.
    pub fn clamp_brightness(requested: i64) -> u8 {
        // The clamp guarantees the value fits in a u8.
        requested.clamp(0, i64::from(MAX_BRIGHTNESS)) as u8
    }
}
