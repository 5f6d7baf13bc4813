//! Saved session state
//!
//! State persisted between sessions: the previously active repository (the
//! resolver's last-resort fallback) and per-repository resolution progress.

use crate::error::ContextError;
use crate::workdir::progress::ProgressSnapshot;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    #[serde(default)]
    pub active_repository_path: Option<String>,

    #[serde(default = "default_first_run")]
    pub first_run: bool,

    #[serde(default)]
    pub resolution_progress_by_path: HashMap<String, ProgressSnapshot>,

    /// RFC 3339 time the state was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

fn default_first_run() -> bool {
    true
}

/// Current time in the form stored in [`SavedState::saved_at`].
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Default for SavedState {
    fn default() -> Self {
        Self {
            active_repository_path: None,
            first_run: default_first_run(),
            resolution_progress_by_path: HashMap::new(),
            saved_at: None,
        }
    }
}

/// JSON file holding the [`SavedState`] between runs.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `file`, or at the platform data directory when unset.
    pub fn resolve(file: Option<&Path>) -> Result<Self, ContextError> {
        match file {
            Some(file) => Ok(Self::new(file)),
            None => Self::default_state_file().map(Self::new).ok_or_else(|| {
                ContextError::State("Could not determine a data directory for saved state".into())
            }),
        }
    }

    pub fn default_state_file() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "wdctx").map(|dirs| dirs.data_dir().join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved state. A missing file is a first run.
    pub fn load(&self) -> Result<SavedState, ContextError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved state, starting fresh");
                Ok(SavedState::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, state: &SavedState) -> Result<(), ContextError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }
}
