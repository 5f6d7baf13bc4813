//! Working-directory contexts: one repository handle plus its auxiliary trackers.

use crate::error::ContextError;
use crate::events::PoolEvent;
use crate::repository::{PlaceholderRepository, Repository, RepositoryState};
use crate::workdir::path::WorkdirPath;
use crate::workdir::progress::ResolutionProgress;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

static CONTEXT_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKind {
    Present(WorkdirPath),
    /// "No active repository."
    Absent,
    /// Startup placeholder rendered before the first resolution completes.
    Guessed,
}

/// Startup signals used to pick the guessed placeholder's repository state.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuessCriteria {
    pub project_path_count: usize,
    pub init_path_count: usize,
}

impl GuessCriteria {
    fn guessed_state(self) -> RepositoryState {
        let expect_repository = self.project_path_count == 1
            || (self.project_path_count == 0 && self.init_path_count == 1);
        if expect_repository {
            RepositoryState::LoadingGuess
        } else {
            RepositoryState::AbsentGuess
        }
    }
}

pub struct WorkdirContext {
    id: u64,
    kind: ContextKind,
    repository: Arc<dyn Repository>,
    progress: Mutex<ResolutionProgress>,
    destroyed: AtomicBool,
    events: Option<broadcast::Sender<PoolEvent>>,
}

impl WorkdirContext {
    pub(crate) fn present(
        workdir: WorkdirPath,
        repository: Arc<dyn Repository>,
        progress: ResolutionProgress,
        events: broadcast::Sender<PoolEvent>,
    ) -> Self {
        Self::build(
            ContextKind::Present(workdir),
            repository,
            progress,
            Some(events),
        )
    }

    pub(crate) fn absent() -> Self {
        Self::build(
            ContextKind::Absent,
            Arc::new(PlaceholderRepository::new(RepositoryState::Absent)),
            ResolutionProgress::default(),
            None,
        )
    }

    pub fn guess(criteria: GuessCriteria) -> Self {
        Self::build(
            ContextKind::Guessed,
            Arc::new(PlaceholderRepository::new(criteria.guessed_state())),
            ResolutionProgress::default(),
            None,
        )
    }

    fn build(
        kind: ContextKind,
        repository: Arc<dyn Repository>,
        progress: ResolutionProgress,
        events: Option<broadcast::Sender<PoolEvent>>,
    ) -> Self {
        Self {
            id: CONTEXT_COUNTER.fetch_add(1, Ordering::Relaxed),
            kind,
            repository,
            progress: Mutex::new(progress),
            destroyed: AtomicBool::new(false),
            events,
        }
    }

    /// Process-unique identity; two handles name the same context iff their ids match.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    pub fn working_directory(&self) -> Option<&WorkdirPath> {
        match &self.kind {
            ContextKind::Present(workdir) => Some(workdir),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self.kind, ContextKind::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        self.kind == ContextKind::Absent
    }

    pub fn is_guessed(&self) -> bool {
        self.kind == ContextKind::Guessed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn repository_state(&self) -> RepositoryState {
        if self.is_destroyed() {
            RepositoryState::Destroyed
        } else {
            self.repository.state()
        }
    }

    pub fn is_undetermined(&self) -> bool {
        self.repository_state().is_undetermined()
    }

    pub fn repository(&self) -> Result<Arc<dyn Repository>, ContextError> {
        self.ensure_live()?;
        Ok(Arc::clone(&self.repository))
    }

    /// Run `f` against this context's resolution progress.
    pub fn with_resolution_progress<R>(
        &self,
        f: impl FnOnce(&mut ResolutionProgress) -> R,
    ) -> Result<R, ContextError> {
        self.ensure_live()?;
        Ok(f(&mut self.progress.lock()))
    }

    /// Called by the repository layer when the checked-out head or the
    /// working directory itself changed.
    pub fn report_workdir_or_head_change(&self) {
        if let (Some(workdir), false) = (self.working_directory(), self.is_destroyed()) {
            self.emit(PoolEvent::WorkdirOrHeadChanged {
                context_id: self.id,
                workdir: workdir.clone(),
            });
        }
    }

    /// Called by the repository layer after it refreshed its cached state.
    pub fn report_repository_update(&self) {
        if let (Some(workdir), false) = (self.working_directory(), self.is_destroyed()) {
            self.emit(PoolEvent::RepositoryUpdated {
                context_id: self.id,
                workdir: workdir.clone(),
            });
        }
    }

    /// Destroy the context and release its repository.
    ///
    /// Returns `true` only for the call that performed the destruction. The
    /// absent context cannot be destroyed.
    pub fn destroy(&self) -> bool {
        if self.is_absent() || self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.repository.destroy();
        debug!(context_id = self.id, context = %self, "Destroyed working directory context");
        self.emit(PoolEvent::ContextDestroyed {
            context_id: self.id,
            workdir: self.working_directory().cloned(),
        });
        true
    }

    fn ensure_live(&self) -> Result<(), ContextError> {
        if self.is_destroyed() {
            return Err(ContextError::StaleContext(self.to_string()));
        }
        Ok(())
    }

    fn emit(&self, event: PoolEvent) {
        if let Some(events) = &self.events {
            // No subscribers is fine.
            let _ = events.send(event);
        }
    }
}

impl fmt::Display for WorkdirContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ContextKind::Present(workdir) => write!(f, "{}", workdir),
            ContextKind::Absent => f.write_str("<absent>"),
            ContextKind::Guessed => f.write_str("<guessed>"),
        }
    }
}

impl fmt::Debug for WorkdirContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkdirContext")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
