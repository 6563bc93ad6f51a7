//! The lifecycle contract every visual program implements.
//!
//! # Lifecycle
//!
//! ```text
//!            setup() ok                 stop() + cleanup()
//!  Stopped ─────────────► Running ───────────────────────► Stopped
//!     ▲                      │
//!     │                      │ advance() error or panic
//!     │   cleanup() (best    ▼
//!     └──────effort)──── Crashed
//! ```
//!
//! `Crashed` is terminal for the instance: the manager drops it and reports no
//! active program.
//!
//! The manager calls [`Program::advance`] once per run-loop tick.  Each call
//! must do one bounded unit of work (usually drawing one frame) and return;
//! nothing can pre-empt a program that blocks inside `advance`.
//!
//! # Cooperative stop
//!
//! Each program receives a [`StopSignal`] at construction.  The program can
//! only read it; the manager keeps the paired [`StopHandle`] and raises it
//! right before calling [`Program::stop`] and [`Program::cleanup`].

pub mod registry;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::display::DisplaySurface;

/// A program's configuration: an opaque JSON object whose keys are owned by
/// each program.
pub type ProgramConfig = serde_json::Map<String, Value>;

/// Pacing used when a program does not ask for a specific frame interval.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// A program could not start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    /// A configuration value has the wrong type or is out of range.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidConfig { key: String, reason: String },

    /// A resource the program needs is not available.
    #[error("resource unavailable: {0}")]
    Resource(String),

    /// `setup` panicked.
    #[error("setup panicked: {0}")]
    Panicked(String),
}

/// A running program failed.  The manager treats this as a crash.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{0}")]
    Failed(String),

    /// `advance` panicked.
    #[error("advance panicked: {0}")]
    Panicked(String),
}

/// Read-only view of the cooperative stop flag.
#[derive(Debug, Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// `true` once the manager asked the program to end.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Write side of the cooperative stop flag, held by the manager.
#[derive(Debug)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Creates a lowered flag and returns both of its sides.
    pub fn pair() -> (StopHandle, StopSignal) {
        let flag = Arc::new(AtomicBool::new(false));
        (StopHandle(Arc::clone(&flag)), StopSignal(flag))
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Everything a factory needs to build a program instance.
#[derive(Debug, Clone)]
pub struct ProgramContext {
    /// Display width in pixels.
    pub width: usize,
    /// Display height in pixels.
    pub height: usize,
    /// Initial configuration (remembered config merged with the request).
    pub config: ProgramConfig,
    pub stop: StopSignal,
}

/// A pluggable unit of visual behaviour.
pub trait Program: Send {
    /// One-time initialization.  An error means the program never started.
    fn setup(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SetupError>;

    /// Performs exactly one bounded unit of work.
    fn advance(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), RuntimeError>;

    /// Notification that the program is being stopped.  The stop signal is
    /// already raised when this is called.
    fn stop(&mut self) {}

    /// Releases resources.  The default clears the display.
    fn cleanup(&mut self, surface: &mut dyn DisplaySurface) {
        surface.clear();
    }

    /// A copy of the live configuration.
    fn config(&self) -> ProgramConfig;

    /// Updates one configuration key.
    ///
    /// Keys the program can tune live take effect immediately.  Unknown keys
    /// are stored without any visible effect; this is never an error.
    fn update_config(&mut self, key: &str, value: Value);

    /// Preferred time between two `advance` calls.
    fn frame_interval(&self) -> Duration {
        DEFAULT_FRAME_INTERVAL
    }
}

/// Merges `patch` into `target`, key-wise overwriting.
///
/// Returns the keys whose value actually changed, in `patch` order.
pub fn merge_config(target: &mut ProgramConfig, patch: &ProgramConfig) -> Vec<String> {
    let mut changed = Vec::new();
    for (key, value) in patch {
        if target.get(key) != Some(value) {
            target.insert(key.clone(), value.clone());
            changed.push(key.clone());
        }
    }
    changed
}
