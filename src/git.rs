//! Git-backed repository handles.
//!
//! Shells out to the `git` executable for operations that change the working
//! directory. State is derived from the presence of repository metadata.

use crate::error::ContextError;
use crate::repository::{Repository, RepositoryFactory, RepositoryState};
use crate::workdir::cache::METADATA_DIR;
use crate::workdir::path::WorkdirPath;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct GitRepository {
    workdir: PathBuf,
    state: Mutex<RepositoryState>,
}

impl GitRepository {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        let state = Self::probe_state(&workdir);
        Self {
            workdir,
            state: Mutex::new(state),
        }
    }

    fn probe_state(workdir: &Path) -> RepositoryState {
        // Loose documents outside any repository can never hold one.
        if workdir.is_file() {
            RepositoryState::Absent
        } else if workdir.join(METADATA_DIR).exists() {
            RepositoryState::Present
        } else {
            RepositoryState::Empty
        }
    }

    /// Re-derive the state after an operation touched the working directory.
    fn refresh(&self) {
        let mut state = self.state.lock();
        if *state != RepositoryState::Destroyed {
            *state = Self::probe_state(&self.workdir);
        }
    }

    fn ensure_live(&self) -> Result<(), ContextError> {
        match *self.state.lock() {
            RepositoryState::Destroyed => Err(ContextError::Repository(format!(
                "Repository at {} was destroyed",
                self.workdir.display()
            ))),
            RepositoryState::Absent => Err(ContextError::Repository(format!(
                "{} is not a directory",
                self.workdir.display()
            ))),
            _ => Ok(()),
        }
    }

    async fn run_git(&self, args: &[&str], cwd: &Path) -> Result<(), ContextError> {
        debug!(workdir = %self.workdir.display(), ?args, "Running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| ContextError::Repository(format!("Failed to run git: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(workdir = %self.workdir.display(), ?args, stderr = %stderr, "git failed");
        Err(ContextError::Repository(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr
        )))
    }
}

#[async_trait]
impl Repository for GitRepository {
    fn state(&self) -> RepositoryState {
        *self.state.lock()
    }

    fn working_directory(&self) -> Option<&Path> {
        Some(&self.workdir)
    }

    /// The in-progress merge's incoming head, if any.
    fn merge_revision(&self) -> Option<String> {
        let merge_head = self.workdir.join(METADATA_DIR).join("MERGE_HEAD");
        std::fs::read_to_string(merge_head)
            .ok()
            .map(|contents| contents.trim().to_string())
            .filter(|revision| !revision.is_empty())
    }

    async fn init(&self) -> Result<(), ContextError> {
        self.ensure_live()?;
        tokio::fs::create_dir_all(&self.workdir).await?;
        self.run_git(&["init", "--quiet"], &self.workdir).await?;
        self.refresh();
        Ok(())
    }

    async fn clone_remote(&self, remote_url: &str) -> Result<(), ContextError> {
        self.ensure_live()?;
        let parent = self.workdir.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(parent).await?;

        let target = self.workdir.to_string_lossy();
        self.run_git(&["clone", "--quiet", "--", remote_url, &*target], parent)
            .await?;
        self.refresh();
        Ok(())
    }

    fn destroy(&self) {
        *self.state.lock() = RepositoryState::Destroyed;
    }
}

/// Opens a [`GitRepository`] for any existing or not-yet-created path.
///
/// Regular files open in the `Absent` state and refuse `init`/`clone_remote`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitRepositoryFactory;

#[async_trait]
impl RepositoryFactory for GitRepositoryFactory {
    async fn open(&self, workdir: &WorkdirPath) -> Result<Arc<dyn Repository>, ContextError> {
        match tokio::fs::metadata(workdir.as_path()).await {
            Ok(_) => Ok(Arc::new(GitRepository::new(workdir.to_path_buf()))),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Ok(Arc::new(GitRepository::new(workdir.to_path_buf())))
            }
            Err(err) => Err(ContextError::RepositoryConstruction {
                path: workdir.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}
