//! Context Pool
//!
//! Owns one [`WorkdirContext`] per resident working directory. Membership is
//! changed in bulk by `reconcile` and point-wise by `add`/`remove`; all of
//! these run inside serial queue tasks, so they never race each other.
//! Readers (`get`, `contexts`) may run from anywhere.

use crate::error::ContextError;
use crate::events::{PoolEvent, EVENT_CHANNEL_CAPACITY};
use crate::repository::RepositoryFactory;
use crate::state::SavedState;
use crate::workdir::context::WorkdirContext;
use crate::workdir::path::WorkdirPath;
use crate::workdir::progress::ResolutionProgress;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Outcome of one `reconcile` call.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub added: Vec<WorkdirPath>,
    pub removed: Vec<WorkdirPath>,
    /// Paths whose repository could not be constructed; they are not resident.
    pub failed: Vec<(WorkdirPath, ContextError)>,
}

impl ReconcileReport {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn failed_for(&self, path: &WorkdirPath) -> bool {
        self.failed.iter().any(|(failed, _)| failed == path)
    }
}

pub struct ContextPool {
    factory: Arc<dyn RepositoryFactory>,
    contexts: RwLock<HashMap<WorkdirPath, Arc<WorkdirContext>>>,
    absent: Arc<WorkdirContext>,
    /// Id of the context currently exposed as active.
    pinned: Mutex<Option<u64>>,
    /// Dropped from membership while pinned; destroyed once unpinned.
    retired: Mutex<Vec<Arc<WorkdirContext>>>,
    events: broadcast::Sender<PoolEvent>,
}

impl ContextPool {
    pub fn new(factory: Arc<dyn RepositoryFactory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            factory,
            contexts: RwLock::new(HashMap::new()),
            absent: Arc::new(WorkdirContext::absent()),
            pinned: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    /// The pool's single absent context.
    pub fn absent(&self) -> Arc<WorkdirContext> {
        Arc::clone(&self.absent)
    }

    /// Resident context for `path`, or the absent context. Never creates.
    pub fn get(&self, path: &WorkdirPath) -> Arc<WorkdirContext> {
        self.contexts
            .read()
            .get(path)
            .filter(|context| !context.is_destroyed())
            .cloned()
            .unwrap_or_else(|| self.absent())
    }

    pub fn contains(&self, path: &WorkdirPath) -> bool {
        self.contexts
            .read()
            .get(path)
            .is_some_and(|context| !context.is_destroyed())
    }

    /// Resident contexts ordered by working directory.
    pub fn contexts(&self) -> Vec<Arc<WorkdirContext>> {
        let contexts = self.contexts.read();
        let mut live: Vec<_> = contexts
            .iter()
            .filter(|(_, context)| !context.is_destroyed())
            .collect();
        live.sort_by(|a, b| a.0.cmp(b.0));
        live.into_iter().map(|(_, context)| Arc::clone(context)).collect()
    }

    pub fn resident_paths(&self) -> Vec<WorkdirPath> {
        self.contexts()
            .iter()
            .filter_map(|context| context.working_directory().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contexts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make membership equal `desired`.
    ///
    /// Missing paths get a new context, surviving entries keep their identity,
    /// and dropped entries are destroyed, except the pinned one, which is only
    /// unlisted until `release_retired` runs after the active pointer moved.
    pub async fn reconcile(
        &self,
        desired: &HashSet<WorkdirPath>,
        saved_state: &SavedState,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let (to_add, to_remove) = {
            let mut contexts = self.contexts.write();
            // Entries destroyed behind the pool's back no longer count as resident.
            contexts.retain(|_, context| !context.is_destroyed());

            let mut to_add: Vec<WorkdirPath> = desired
                .iter()
                .filter(|path| !contexts.contains_key(*path))
                .cloned()
                .collect();
            to_add.sort();

            let mut to_remove: Vec<WorkdirPath> = contexts
                .keys()
                .filter(|path| !desired.contains(*path))
                .cloned()
                .collect();
            to_remove.sort();
            (to_add, to_remove)
        };

        for path in to_add {
            match self.construct(&path, saved_state).await {
                Ok(context) => {
                    self.contexts.write().insert(path.clone(), context);
                    report.added.push(path);
                }
                Err(err) => {
                    warn!(workdir = %path, error = %err, "Failed to construct working directory context");
                    report.failed.push((path, err));
                }
            }
        }

        for path in to_remove {
            let Some(context) = self.contexts.write().remove(&path) else {
                continue;
            };
            self.retire_or_destroy(context);
            report.removed.push(path);
        }

        if !report.is_unchanged() {
            info!(
                added = report.added.len(),
                removed = report.removed.len(),
                resident = self.contexts.read().len(),
                "Reconciled context pool"
            );
            self.emit(PoolEvent::MembershipChanged {
                added: report.added.clone(),
                removed: report.removed.clone(),
            });
        }

        report
    }

    /// Ensure a context exists for `path` and return it.
    pub async fn add(&self, path: &WorkdirPath) -> Result<Arc<WorkdirContext>, ContextError> {
        if self.contains(path) {
            return Ok(self.get(path));
        }

        let context = self.construct(path, &SavedState::default()).await?;
        if let Some(stale) = self
            .contexts
            .write()
            .insert(path.clone(), Arc::clone(&context))
        {
            stale.destroy();
        }
        debug!(workdir = %path, "Added working directory context");
        self.emit(PoolEvent::MembershipChanged {
            added: vec![path.clone()],
            removed: Vec::new(),
        });
        Ok(context)
    }

    /// Destroy and drop the context for `path`. Returns whether one was resident.
    pub fn remove(&self, path: &WorkdirPath) -> bool {
        let Some(context) = self.contexts.write().remove(path) else {
            return false;
        };
        let was_live = context.destroy();
        self.emit(PoolEvent::MembershipChanged {
            added: Vec::new(),
            removed: vec![path.clone()],
        });
        was_live
    }

    /// Destroy every context, retired ones included.
    pub fn clear(&self) {
        let drained: Vec<_> = self.contexts.write().drain().collect();
        let retired: Vec<_> = std::mem::take(&mut *self.retired.lock());

        let mut removed = Vec::with_capacity(drained.len());
        for (path, context) in drained {
            context.destroy();
            removed.push(path);
        }
        for context in retired {
            context.destroy();
        }
        *self.pinned.lock() = None;

        if !removed.is_empty() {
            removed.sort();
            info!(removed = removed.len(), "Cleared context pool");
            self.emit(PoolEvent::MembershipChanged {
                added: Vec::new(),
                removed,
            });
        }
    }

    /// Mark `context` as the one currently exposed to readers.
    pub fn pin(&self, context: &WorkdirContext) {
        *self.pinned.lock() = Some(context.id());
    }

    /// Destroy retired contexts other than `active`.
    pub fn release_retired(&self, active: &WorkdirContext) {
        let mut retired = self.retired.lock();
        retired.retain(|context| {
            if context.id() == active.id() {
                return true;
            }
            context.destroy();
            false
        });
    }

    async fn construct(
        &self,
        path: &WorkdirPath,
        saved_state: &SavedState,
    ) -> Result<Arc<WorkdirContext>, ContextError> {
        let repository = self.factory.open(path).await?;
        let revision = repository.merge_revision().unwrap_or_default();
        let progress = match saved_state.resolution_progress_by_path.get(path.as_str()) {
            Some(snapshot) => ResolutionProgress::restore(revision, snapshot),
            None => ResolutionProgress::new(revision),
        };
        Ok(Arc::new(WorkdirContext::present(
            path.clone(),
            repository,
            progress,
            self.events.clone(),
        )))
    }

    fn retire_or_destroy(&self, context: Arc<WorkdirContext>) {
        let pinned = *self.pinned.lock();
        if pinned == Some(context.id()) {
            debug!(context = %context, "Deferring destruction of active context");
            self.retired.lock().push(context);
        } else {
            context.destroy();
        }
    }

    fn emit(&self, event: PoolEvent) {
        let _ = self.events.send(event);
    }
}
