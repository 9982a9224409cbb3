/// Persisted state storage.
///
/// The run pipeline brackets its work with `load()` and `save()`; this
/// module owns the file format and location. Saves go through a temp file
/// plus rename so a crash mid-write never leaves a truncated state file.
/// No locking: overlapping invocations are out of scope, the service is
/// scheduled as a single periodic job.

use crate::logging::{self, Source};
use crate::model::PersistedState;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Load/save seam for the persisted state, so the pipeline can run against
/// an in-memory store in tests.
pub trait StateStore {
    /// Loads the state, falling back to defaults when nothing usable is
    /// on disk. Never fails: a corrupt state file means starting over.
    fn load(&self) -> PersistedState;
    /// Persists the state atomically.
    fn save(&self, state: &PersistedState) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Default location: `~/.rainmon_state.json`, or the current directory if
/// the home directory cannot be determined.
pub fn default_state_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rainmon_state.json")
}

/// State persisted as a pretty-printed JSON file.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonStateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> PersistedState {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(state) => state,
                Err(e) => {
                    logging::warn(
                        Source::State,
                        None,
                        &format!(
                            "State file {} is corrupt ({}); starting from defaults",
                            self.path.display(),
                            e
                        ),
                    );
                    PersistedState::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => PersistedState::default(),
            Err(e) => {
                logging::warn(
                    Source::State,
                    None,
                    &format!(
                        "Could not read state file {} ({}); starting from defaults",
                        self.path.display(),
                        e
                    ),
                );
                PersistedState::default()
            }
        }
    }

    fn save(&self, state: &PersistedState) -> io::Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Write-then-rename keeps the old state intact if we die mid-write.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
