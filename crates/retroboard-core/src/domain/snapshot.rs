//! The durable snapshot of manager state.
//!
//! The snapshot is what lets the server "resume where it left off" after a
//! restart.  It is written after every successful mutation and read once at
//! startup.  The on-disk representation is JSON:
//!
//! ```json
//! {
//!   "last_program": "scroll_text",
//!   "program_configs": { "scroll_text": { "text": "Hi", "speed": 2 } },
//!   "settings": { "brightness": 80 },
//!   "carousel": { "enabled": false, "playlist": [], "index": 0 }
//! }
//! ```
//!
//! Every field has a serde default so that files written by older versions
//! (or hand-edited files missing sections) still load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::carousel::PlaylistEntry;
use crate::domain::settings::GlobalSettings;
use crate::program::ProgramConfig;

/// Carousel configuration as stored on disk.
///
/// The last-transition instant is deliberately absent: it is a monotonic
/// clock reading that means nothing in another process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedCarousel {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, alias = "apps")]
    pub playlist: Vec<PlaylistEntry>,
    #[serde(default)]
    pub index: usize,
}

/// Everything the manager needs to restore itself after a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    /// Program to resume on the next launch.  `None` after an explicit stop.
    #[serde(default, alias = "last_app")]
    pub last_program: Option<String>,
    /// Last-known configuration of every program that has ever run or been
    /// configured.
    #[serde(default, alias = "app_configs")]
    pub program_configs: BTreeMap<String, ProgramConfig>,
    #[serde(default)]
    pub settings: GlobalSettings,
    #[serde(default)]
    pub carousel: PersistedCarousel,
}

impl PersistedSnapshot {
    /// `true` for the well-defined empty snapshot returned when nothing was
    /// ever saved (or the file could not be read).
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_snapshot() -> PersistedSnapshot {
        let mut scroll = ProgramConfig::new();
        scroll.insert("text".to_string(), json!("State Test Message"));
        scroll.insert("color".to_string(), json!([255, 100, 50]));
        scroll.insert("speed".to_string(), json!(3));

        let mut program_configs = BTreeMap::new();
        program_configs.insert("scroll_text".to_string(), scroll);
        program_configs.insert("clock".to_string(), ProgramConfig::new());

        PersistedSnapshot {
            last_program: Some("scroll_text".to_string()),
            program_configs,
            settings: GlobalSettings { brightness: 55 },
            carousel: PersistedCarousel {
                enabled: true,
                playlist: vec![
                    PlaylistEntry::new("clock", 30.0),
                    PlaylistEntry::new("scroll_text", 12.5),
                ],
                index: 1,
            },
        }
    }

    #[test]
    fn test_snapshot_json_round_trip_is_lossless() {
        // Arrange
        let snapshot = sample_snapshot();

        // Act
        let json = serde_json::to_string_pretty(&snapshot).expect("serialize");
        let restored: PersistedSnapshot = serde_json::from_str(&json).expect("deserialize");

        // Assert
        assert_eq!(snapshot, restored);
    }

    #[test]
    fn test_null_last_program_serializes_as_null() {
        let snapshot = PersistedSnapshot::default();
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value["last_program"].is_null());
        assert_eq!(value["settings"]["brightness"], 100);
        assert_eq!(value["carousel"]["index"], 0);
    }

    #[test]
    fn test_empty_object_loads_as_empty_snapshot() {
        let snapshot: PersistedSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_legacy_field_names_are_accepted() {
        let raw = r#"{"last_app":"clock","app_configs":{"clock":{"color":[255,0,0]}}}"#;
        let snapshot: PersistedSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.last_program.as_deref(), Some("clock"));
        assert_eq!(snapshot.program_configs["clock"]["color"], json!([255, 0, 0]));
    }

    #[test]
    fn test_snapshot_with_content_is_not_empty() {
        assert!(!sample_snapshot().is_empty());
    }
}
