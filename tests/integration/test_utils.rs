//! Shared test utilities for integration tests
//!
//! Fake repository capability, a recording presenter, and filesystem fixtures
//! for building throwaway repositories in temp directories.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wdctx::{
    ActiveContextController, ContextError, ControllerDeps, GuessCriteria, Presenter, Repository,
    RepositoryFactory, RepositoryState, StaticWorkspace, WdctxConfig, WorkdirContext, WorkdirPath,
};

/// Repository double that records lifecycle calls.
pub struct FakeRepository {
    workdir: PathBuf,
    state: Mutex<RepositoryState>,
    revision: Option<String>,
    destroy_calls: AtomicUsize,
    cloned_from: Mutex<Option<String>>,
}

impl FakeRepository {
    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn cloned_from(&self) -> Option<String> {
        self.cloned_from.lock().clone()
    }

    pub fn path(&self) -> &Path {
        &self.workdir
    }

    fn mark_present(&self) -> Result<(), ContextError> {
        std::fs::create_dir_all(self.workdir.join(".git"))?;
        *self.state.lock() = RepositoryState::Present;
        Ok(())
    }
}

#[async_trait]
impl Repository for FakeRepository {
    fn state(&self) -> RepositoryState {
        *self.state.lock()
    }

    fn working_directory(&self) -> Option<&Path> {
        Some(&self.workdir)
    }

    fn merge_revision(&self) -> Option<String> {
        self.revision.clone()
    }

    async fn init(&self) -> Result<(), ContextError> {
        self.mark_present()
    }

    async fn clone_remote(&self, remote_url: &str) -> Result<(), ContextError> {
        *self.cloned_from.lock() = Some(remote_url.to_string());
        self.mark_present()
    }

    fn destroy(&self) {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = RepositoryState::Destroyed;
    }
}

/// Factory double: counts opens, can be told to fail or stall for specific paths.
#[derive(Default)]
pub struct FakeFactory {
    opened: AtomicUsize,
    failing: Mutex<HashSet<WorkdirPath>>,
    delay: Mutex<Option<Duration>>,
    revision: Mutex<Option<String>>,
    repositories: Mutex<Vec<Arc<FakeRepository>>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, path: impl AsRef<Path>) {
        self.failing.lock().insert(WorkdirPath::new(path));
    }

    /// Make every construction suspend for `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn set_revision(&self, revision: &str) {
        *self.revision.lock() = Some(revision.to_string());
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Every repository handed out for `path`, oldest first.
    pub fn repositories_for(&self, path: impl AsRef<Path>) -> Vec<Arc<FakeRepository>> {
        let path = WorkdirPath::new(path);
        self.repositories
            .lock()
            .iter()
            .filter(|repo| repo.workdir == path.as_path())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RepositoryFactory for FakeFactory {
    async fn open(&self, workdir: &WorkdirPath) -> Result<Arc<dyn Repository>, ContextError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().contains(workdir) {
            return Err(ContextError::RepositoryConstruction {
                path: workdir.to_string(),
                reason: "refused by test".to_string(),
            });
        }

        let state = if workdir.as_path().join(".git").exists() {
            RepositoryState::Present
        } else {
            RepositoryState::Empty
        };
        let repository = Arc::new(FakeRepository {
            workdir: workdir.to_path_buf(),
            state: Mutex::new(state),
            revision: self.revision.lock().clone(),
            destroy_calls: AtomicUsize::new(0),
            cloned_from: Mutex::new(None),
        });
        self.repositories.lock().push(Arc::clone(&repository));
        Ok(repository)
    }
}

/// Presenter that records what it rendered.
#[derive(Default)]
pub struct RecordingPresenter {
    rendered: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn render(&self, active: &Arc<WorkdirContext>) {
        tokio::task::yield_now().await;
        self.rendered.lock().push(active.to_string());
    }
}

/// Create `root/name` with repository metadata inside it.
pub fn make_repo(root: &Path, name: &str) -> PathBuf {
    let path = root.join(name);
    std::fs::create_dir_all(path.join(".git")).unwrap();
    path
}

/// Create `root/name` without repository metadata.
pub fn make_dir(root: &Path, name: &str) -> PathBuf {
    let path = root.join(name);
    std::fs::create_dir_all(&path).unwrap();
    path
}

pub fn workdir(path: impl AsRef<Path>) -> WorkdirPath {
    WorkdirPath::new(path)
}

/// A controller wired to fakes over a fresh temp directory.
pub struct Harness {
    pub temp: TempDir,
    pub workspace: Arc<StaticWorkspace>,
    pub factory: Arc<FakeFactory>,
    pub presenter: Arc<RecordingPresenter>,
    pub controller: ActiveContextController,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_criteria(GuessCriteria::default())
    }

    pub fn with_criteria(criteria: GuessCriteria) -> Self {
        let temp = TempDir::new().unwrap();
        let workspace = Arc::new(StaticWorkspace::default());
        let factory = FakeFactory::new();
        let presenter = RecordingPresenter::new();
        let controller = ActiveContextController::new(
            ControllerDeps {
                workspace: workspace.clone(),
                factory: factory.clone(),
                presenter: presenter.clone(),
            },
            &WdctxConfig::default(),
            criteria,
        );
        Self {
            temp,
            workspace,
            factory,
            presenter,
            controller,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn active_workdir(&self) -> Option<WorkdirPath> {
        self.controller.active_working_directory()
    }
}
