//! JSON file implementation of the manager's state repository.
//!
//! # Atomic writes
//!
//! A snapshot is never written in place:
//!
//! 1. Serialize pretty JSON to `<path>.tmp` (the extension is replaced, so
//!    `state.json` becomes `state.json.tmp`).
//! 2. Flush and `sync_all` the temporary file.
//! 3. Rename it over `<path>`.
//!
//! A reader therefore sees either the previous snapshot or the new one.
//!
//! # Reads
//!
//! A missing file is a first run.  An unreadable or malformed file is logged
//! at `warn` and treated the same way, so a corrupt state file can never keep
//! the server from starting.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use retroboard_core::PersistedSnapshot;

use crate::application::persistence::{PersistenceError, StateRepository};

/// State repository backed by one JSON file.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        let extension = match self.path.extension() {
            Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
            None => "tmp".to_string(),
        };
        tmp.set_extension(extension);
        tmp
    }

    /// Reads the stored snapshot, distinguishing "nothing stored" (`Ok(None)`)
    /// from failures.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Io`] when the file exists but cannot be
    /// read and [`PersistenceError::Parse`] when it is not a valid snapshot.
    pub fn read(&self) -> Result<Option<PersistedSnapshot>, PersistenceError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&self.path)(e)),
        };
        let snapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(PersistenceError::Parse)?;
        Ok(Some(snapshot))
    }
}

impl StateRepository for JsonStateStore {
    fn load(&self) -> PersistedSnapshot {
        match self.read() {
            Ok(Some(snapshot)) => {
                debug!(path = %self.path.display(), "loaded saved state");
                snapshot
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no state file yet");
                PersistedSnapshot::default()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring unreadable state file"
                );
                PersistedSnapshot::default()
            }
        }
    }

    fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let tmp_path = self.temp_path();
        {
            let file = File::create(&tmp_path).map_err(io_error(&tmp_path))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, snapshot)
                .map_err(PersistenceError::Serialize)?;
            writer.flush().map_err(io_error(&tmp_path))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(io_error(&tmp_path))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(io_error(&self.path))?;

        debug!(
            path = %self.path.display(),
            last_program = ?snapshot.last_program,
            "saved state"
        );
        Ok(())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError {
    let path = path.to_path_buf();
    move |source| PersistenceError::Io { path, source }
}
