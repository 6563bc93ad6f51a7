//! Read-side view of the manager, published through a `watch` channel.
//!
//! Control sessions answer queries from the latest [`ManagerStatus`] and never
//! reach into the manager itself.

use std::collections::BTreeMap;

use serde::Serialize;

use retroboard_core::{PersistedCarousel, ProgramConfig};

/// Whether a program currently owns the display.
///
/// A crash is terminal for the instance and leaves the manager `Stopped`; the
/// failure itself is kept in [`ManagerStatus::last_crash`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No program is active.
    #[default]
    Stopped,
    /// A program completed `setup` and is being advanced.
    Running,
}

/// The most recent program failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrashReport {
    pub program: String,
    pub error: String,
}

/// Snapshot of the manager's state for readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManagerStatus {
    pub current_program: Option<String>,
    pub lifecycle: LifecycleState,
    pub last_crash: Option<CrashReport>,
    pub program_configs: BTreeMap<String, ProgramConfig>,
    pub brightness: u8,
    pub carousel: PersistedCarousel,
    /// `false` once the run loop has exited.
    pub running: bool,
}
