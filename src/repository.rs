//! Repository capability consumed by the context pool.
//!
//! The pool only decides how many repository handles exist and when they are
//! released; what a handle does with its working directory is up to the
//! implementation behind these traits.

use crate::error::ContextError;
use crate::workdir::path::WorkdirPath;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Lifecycle state reported by a repository handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryState {
    /// Placeholder used at startup when a repository is probably on its way.
    LoadingGuess,
    /// Placeholder used at startup when no repository is expected.
    AbsentGuess,
    Absent,
    Loading,
    /// Working directory exists but holds no repository yet.
    Empty,
    Present,
    Destroyed,
}

impl RepositoryState {
    /// Guess states have not been confirmed by any resolution yet.
    pub fn is_undetermined(self) -> bool {
        matches!(self, RepositoryState::LoadingGuess | RepositoryState::AbsentGuess)
    }

    pub fn is_present(self) -> bool {
        self == RepositoryState::Present
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepositoryState::LoadingGuess => "loading-guess",
            RepositoryState::AbsentGuess => "absent-guess",
            RepositoryState::Absent => "absent",
            RepositoryState::Loading => "loading",
            RepositoryState::Empty => "empty",
            RepositoryState::Present => "present",
            RepositoryState::Destroyed => "destroyed",
        }
    }
}

/// Handle to one repository.
#[async_trait]
pub trait Repository: Send + Sync {
    fn state(&self) -> RepositoryState;

    fn working_directory(&self) -> Option<&Path>;

    /// Revision that conflict-resolution progress is recorded against.
    fn merge_revision(&self) -> Option<String> {
        None
    }

    /// Create a new repository in the working directory.
    async fn init(&self) -> Result<(), ContextError>;

    /// Populate the working directory from `remote_url`.
    async fn clone_remote(&self, remote_url: &str) -> Result<(), ContextError>;

    /// Release every resource held by the handle.
    fn destroy(&self);
}

/// Constructs repository handles for working directories.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    async fn open(&self, workdir: &WorkdirPath) -> Result<Arc<dyn Repository>, ContextError>;
}

/// Repository stand-in for the absent and guessed contexts.
pub struct PlaceholderRepository {
    state: Mutex<RepositoryState>,
}

impl PlaceholderRepository {
    pub fn new(state: RepositoryState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl Repository for PlaceholderRepository {
    fn state(&self) -> RepositoryState {
        *self.state.lock()
    }

    fn working_directory(&self) -> Option<&Path> {
        None
    }

    async fn init(&self) -> Result<(), ContextError> {
        Err(ContextError::Repository(
            "Cannot initialize a repository without a working directory".to_string(),
        ))
    }

    async fn clone_remote(&self, _remote_url: &str) -> Result<(), ContextError> {
        Err(ContextError::Repository(
            "Cannot clone into a repository without a working directory".to_string(),
        ))
    }

    fn destroy(&self) {
        *self.state.lock() = RepositoryState::Destroyed;
    }
}
