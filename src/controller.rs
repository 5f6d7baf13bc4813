//! Active Context Controller
//!
//! Single owner of the active-context pointer. Updates are scheduled onto the
//! serial lane, resolved from scratch against current workspace signals, and
//! swapped in with lifecycle notifications around the presenter's render.

use crate::config::WdctxConfig;
use crate::error::ContextError;
use crate::events::{ActiveContextEvent, PoolEvent, EVENT_CHANNEL_CAPACITY};
use crate::queue::{PushOptions, SerialTaskQueue, TaskHandle};
use crate::repository::{Repository, RepositoryFactory};
use crate::resolver::ContextResolver;
use crate::state::{timestamp_now, SavedState};
use crate::workdir::{
    ContextPool, GuessCriteria, ProgressSnapshot, WorkdirCache, WorkdirContext, WorkdirPath,
};
use crate::workspace::{Workspace, WorkspaceSignals};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Presentation layer: renders whatever context is active.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Render `active`; resolves once the render has been flushed.
    async fn render(&self, active: &Arc<WorkdirContext>);
}

/// Presenter for headless hosts.
pub struct NoopPresenter;

#[async_trait]
impl Presenter for NoopPresenter {
    async fn render(&self, _active: &Arc<WorkdirContext>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Guessed,
    Resolving,
    Active,
}

/// Snapshot of the controller's state machine.
#[derive(Debug, Clone)]
pub enum ControllerState {
    /// Startup placeholder still active, no resolution running.
    Guessed,
    Resolving,
    Active(Arc<WorkdirContext>),
}

/// Collaborators the controller is built from.
pub struct ControllerDeps {
    pub workspace: Arc<dyn Workspace>,
    pub factory: Arc<dyn RepositoryFactory>,
    pub presenter: Arc<dyn Presenter>,
}

pub struct ActiveContextController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    workspace: Arc<dyn Workspace>,
    factory: Arc<dyn RepositoryFactory>,
    presenter: Arc<dyn Presenter>,
    cache: Arc<WorkdirCache>,
    pool: Arc<ContextPool>,
    resolver: ContextResolver,
    queue: SerialTaskQueue,
    active: RwLock<Arc<WorkdirContext>>,
    guessed: Mutex<Option<Arc<WorkdirContext>>>,
    phase: Mutex<Phase>,
    update_seq: AtomicU64,
    events: broadcast::Sender<ActiveContextEvent>,
    destroy_listener: Mutex<Option<JoinHandle<()>>>,
}

impl ActiveContextController {
    /// Build the controller with the guessed placeholder active.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(deps: ControllerDeps, config: &WdctxConfig, criteria: GuessCriteria) -> Self {
        let cache = Arc::new(WorkdirCache::new(config.cache.max_entries));
        let pool = Arc::new(ContextPool::new(Arc::clone(&deps.factory)));
        let guessed = Arc::new(WorkdirContext::guess(criteria));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let inner = Arc::new(ControllerInner {
            workspace: deps.workspace,
            factory: deps.factory,
            presenter: deps.presenter,
            resolver: ContextResolver::new(Arc::clone(&cache), Arc::clone(&pool)),
            cache,
            pool,
            queue: SerialTaskQueue::new(),
            active: RwLock::new(Arc::clone(&guessed)),
            guessed: Mutex::new(Some(guessed)),
            phase: Mutex::new(Phase::Guessed),
            update_seq: AtomicU64::new(0),
            events,
            destroy_listener: Mutex::new(None),
        });

        let listener = ControllerInner::spawn_destroy_listener(&inner);
        *inner.destroy_listener.lock() = Some(listener);

        Self { inner }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActiveContextEvent> {
        self.inner.events.subscribe()
    }

    pub fn pool(&self) -> &Arc<ContextPool> {
        &self.inner.pool
    }

    pub fn cache(&self) -> &Arc<WorkdirCache> {
        &self.inner.cache
    }

    pub fn queue(&self) -> &SerialTaskQueue {
        &self.inner.queue
    }

    /// Read-only snapshot of the active context.
    pub fn active_context(&self) -> Arc<WorkdirContext> {
        self.inner.active()
    }

    pub fn active_working_directory(&self) -> Option<WorkdirPath> {
        self.inner.active().working_directory().cloned()
    }

    pub fn active_repository(&self) -> Result<Arc<dyn Repository>, ContextError> {
        self.inner.active().repository()
    }

    pub fn active_resolution_progress(&self) -> Result<ProgressSnapshot, ContextError> {
        self.inner
            .active()
            .with_resolution_progress(|progress| progress.snapshot())
    }

    pub fn state(&self) -> ControllerState {
        match *self.inner.phase.lock() {
            Phase::Guessed => ControllerState::Guessed,
            Phase::Resolving => ControllerState::Resolving,
            Phase::Active => ControllerState::Active(self.inner.active()),
        }
    }

    /// Queue a resolution. The returned handle resolves when this update finished.
    pub fn schedule_update(&self, saved_state: SavedState) -> TaskHandle<()> {
        let update = self.inner.update_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let scheduled_at = Instant::now();
        self.inner.emit(ActiveContextEvent::Scheduled { update });

        let inner = Arc::clone(&self.inner);
        self.inner.queue.push(
            async move {
                inner
                    .update_active_context(saved_state, update, scheduled_at)
                    .await
            },
            PushOptions::serial(),
        )
    }

    /// Create the directory, initialize a repository in it, and make it a project.
    pub async fn create_repository_for_project_path(
        &self,
        project_path: impl AsRef<Path>,
    ) -> Result<(), ContextError> {
        let project_path = project_path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&project_path).await?;
        let workdir = WorkdirPath::new(&project_path);

        let pool = Arc::clone(&self.inner.pool);
        let context = {
            let workdir = workdir.clone();
            self.inner
                .queue
                .push(async move { pool.add(&workdir).await }, PushOptions::serial())
                .await?
        };

        context.repository()?.init().await?;
        self.invalidate_roots(&project_path, &workdir);
        info!(workdir = %workdir, "Initialized repository");

        if !self.inner.workspace.contains(&project_path) {
            self.inner.workspace.add_project_path(&project_path);
        }
        self.schedule_update(SavedState::default()).await
    }

    /// Clone `remote_url` into `project_path` and make it a project.
    pub async fn clone_repository_for_project_path(
        &self,
        remote_url: &str,
        project_path: impl AsRef<Path>,
    ) -> Result<(), ContextError> {
        let project_path = project_path.as_ref().to_path_buf();
        let workdir = WorkdirPath::new(&project_path);

        let context = self.inner.pool.get(&workdir);
        let (repository, detached) = if context.is_present() {
            (context.repository()?, false)
        } else {
            (self.inner.factory.open(&workdir).await?, true)
        };

        let cloned = repository.clone_remote(remote_url).await;
        if detached {
            repository.destroy();
        }
        cloned?;
        self.invalidate_roots(&project_path, &workdir);
        info!(workdir = %workdir, remote_url, "Cloned repository");

        self.inner.workspace.add_project_path(&project_path);
        self.schedule_update(SavedState::default()).await
    }

    /// State to persist for the next session.
    pub fn serialize(&self) -> SavedState {
        let active = self.inner.active();
        let resolution_progress_by_path = self
            .inner
            .pool
            .contexts()
            .into_iter()
            .filter_map(|context| {
                let workdir = context.working_directory()?.as_str().to_string();
                let snapshot = context
                    .with_resolution_progress(|progress| progress.snapshot())
                    .ok()?;
                (!snapshot.paths.is_empty()).then_some((workdir, snapshot))
            })
            .collect();

        SavedState {
            active_repository_path: active.working_directory().map(|w| w.as_str().to_string()),
            first_run: false,
            resolution_progress_by_path,
            saved_at: Some(timestamp_now()),
        }
    }

    /// Destroy every pooled context and the guessed placeholder if it is still alive.
    pub async fn deactivate(&self) -> Result<(), ContextError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .queue
            .push(
                async move {
                    inner.pool.clear();
                    inner.destroy_guessed();
                    Ok(())
                },
                PushOptions::serial(),
            )
            .await
    }

    fn invalidate_roots(&self, project_path: &Path, workdir: &WorkdirPath) {
        self.inner.cache.invalidate_under(project_path);
        self.inner.cache.invalidate_under(workdir.as_path());
    }
}

impl ControllerInner {
    fn active(&self) -> Arc<WorkdirContext> {
        Arc::clone(&self.active.read())
    }

    fn emit(&self, event: ActiveContextEvent) {
        let _ = self.events.send(event);
    }

    fn destroy_guessed(&self) -> bool {
        match self.guessed.lock().take() {
            Some(guessed) => guessed.destroy(),
            None => false,
        }
    }

    async fn update_active_context(
        &self,
        saved_state: SavedState,
        update: u64,
        scheduled_at: Instant,
    ) -> Result<(), ContextError> {
        if self.workspace.is_destroyed() {
            debug!(update, "Workspace destroyed, skipping active context update");
            return Ok(());
        }

        self.emit(ActiveContextEvent::Began { update });
        *self.phase.lock() = Phase::Resolving;

        let signals = WorkspaceSignals::capture(self.workspace.as_ref());
        let current = self.active();
        let resolution = self.resolver.resolve(&signals, &current, &saved_state).await;

        let changed = self.set_active_context(resolution.context, update).await;
        debug!(
            update,
            changed,
            rule = ?resolution.rule,
            duration_ms = scheduled_at.elapsed().as_millis() as u64,
            "Active context update finished"
        );
        Ok(())
    }

    /// Swap the active pointer to `next`. Returns whether it changed.
    async fn set_active_context(&self, next: Arc<WorkdirContext>, update: u64) -> bool {
        let previous = self.active();
        let changed = previous.id() != next.id();

        if changed {
            if previous.is_guessed() {
                self.destroy_guessed();
            }
            *self.active.write() = Arc::clone(&next);
            self.pool.pin(&next);
            info!(update, from = %previous, to = %next, "Active context changed");
        }

        // Entries dropped while they were active can go now that the pointer moved.
        self.pool.release_retired(&next);
        *self.phase.lock() = if next.is_guessed() {
            Phase::Guessed
        } else {
            Phase::Active
        };

        if changed {
            self.presenter.render(&next).await;
            self.emit(ActiveContextEvent::ContextChangeRendered { update });
        }
        self.emit(ActiveContextEvent::Finished { update, changed });
        changed
    }

    fn spawn_destroy_listener(inner: &Arc<Self>) -> JoinHandle<()> {
        let mut events = inner.pool.subscribe();
        let weak: Weak<Self> = Arc::downgrade(inner);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(PoolEvent::ContextDestroyed { context_id, .. }) => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        if inner.active().id() == context_id {
                            Self::schedule_absent_fallback(&inner, context_id);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Context destruction listener lagged");
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        // A missed destruction of the active context is caught here.
                        let active = inner.active();
                        if active.is_destroyed() {
                            Self::schedule_absent_fallback(&inner, active.id());
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Fall back to absent if `context_id` is still active once the lane gets to it.
    fn schedule_absent_fallback(inner: &Arc<Self>, context_id: u64) {
        let update = inner.update_seq.fetch_add(1, Ordering::Relaxed) + 1;
        inner.emit(ActiveContextEvent::Scheduled { update });

        let task_inner = Arc::clone(inner);
        // Nobody awaits the fallback; the lane runs it regardless.
        drop(inner.queue.push(
            async move {
                if task_inner.active().id() != context_id {
                    task_inner.emit(ActiveContextEvent::Finished {
                        update,
                        changed: false,
                    });
                    return Ok(());
                }
                warn!(context_id, "Active context was destroyed, falling back to absent");
                task_inner.emit(ActiveContextEvent::Began { update });
                let absent = task_inner.pool.absent();
                task_inner.set_active_context(absent, update).await;
                Ok(())
            },
            PushOptions::serial(),
        ));
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let Some(listener) = self.destroy_listener.get_mut().take() {
            listener.abort();
        }
    }
}
