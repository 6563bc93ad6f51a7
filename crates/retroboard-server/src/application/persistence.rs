//! Persistence port for the manager's durable snapshot.
//!
//! The manager writes a [`PersistedSnapshot`] after every mutating command and
//! reads one back on startup.  The concrete adapter lives in
//! `infrastructure::storage::state_store`; tests substitute an in-memory or
//! mocked implementation.

use std::path::PathBuf;

use thiserror::Error;

use retroboard_core::PersistedSnapshot;

/// Error type for snapshot reads and writes.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing state at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be serialized to JSON.
    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The stored JSON is not a valid snapshot.
    #[error("failed to parse state: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Reads and writes the durable snapshot.
#[cfg_attr(test, mockall::automock)]
pub trait StateRepository: Send {
    /// Returns the stored snapshot.
    ///
    /// Implementations return [`PersistedSnapshot::default`] when nothing is
    /// stored yet or the stored data is unreadable; they log the latter.
    fn load(&self) -> PersistedSnapshot;

    /// Replaces the stored snapshot.  Either the old or the new snapshot is
    /// observable afterwards, never a partial write.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the snapshot could not be written.
    fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError>;
}
