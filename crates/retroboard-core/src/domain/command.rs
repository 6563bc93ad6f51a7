//! The closed set of commands external actors may enqueue for the manager.
//!
//! # JSON discriminant
//!
//! Every command is a JSON object with an `"action"` field that identifies the
//! variant.  All other fields are flattened into the same object:
//!
//! ```json
//! {"action":"switch","program":"clock","config":{"color":[255,0,0]}}
//! {"action":"config","key":"text","value":"Hello"}
//! {"action":"settings","brightness":40}
//! {"action":"carousel","enabled":true,"playlist":[{"program":"clock","duration":30}]}
//! {"action":"quit"}
//! ```
//!
//! Commands are immutable once enqueued.  The queue preserves their order and
//! that order is the only ordering guarantee between them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::carousel::PlaylistEntry;
use crate::program::ProgramConfig;

/// A request to change manager state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Command {
    /// Stop the active program and start `program`.
    ///
    /// `config` is merged over the program's remembered configuration, so an
    /// empty object resumes the program exactly as it was last configured.
    #[serde(rename = "switch")]
    Switch {
        #[serde(alias = "app")]
        program: String,
        #[serde(default)]
        config: ProgramConfig,
    },

    /// Stop the active program and forget it as the program to resume.
    #[serde(rename = "stop")]
    Stop,

    /// Set one configuration key on the active program.
    #[serde(rename = "config")]
    SetConfig { key: String, value: Value },

    /// Merge keys into the stored configuration of any registered program.
    #[serde(rename = "program_config")]
    SetProgramConfig {
        #[serde(alias = "app")]
        program: String,
        config: ProgramConfig,
    },

    /// Change global display settings.
    ///
    /// Kept signed and wide so out-of-range values from callers reach the
    /// manager's clamp instead of failing deserialization.
    #[serde(rename = "settings")]
    SetSettings { brightness: i64 },

    /// Replace the carousel configuration.
    #[serde(rename = "carousel")]
    SetCarousel {
        enabled: bool,
        #[serde(default, alias = "apps")]
        playlist: Vec<PlaylistEntry>,
    },

    /// Leave the run loop after the current tick.
    #[serde(rename = "quit")]
    Quit,
}

impl Command {
    /// The wire name of this command's action, for log lines and replies.
    pub fn action(&self) -> &'static str {
        match self {
            Command::Switch { .. } => "switch",
            Command::Stop => "stop",
            Command::SetConfig { .. } => "config",
            Command::SetProgramConfig { .. } => "program_config",
            Command::SetSettings { .. } => "settings",
            Command::SetCarousel { .. } => "carousel",
            Command::Quit => "quit",
        }
    }
}
