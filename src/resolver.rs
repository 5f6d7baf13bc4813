//! Active Context Resolution
//!
//! Picks the context that should be active from workspace signals. In
//! priority order it prefers:
//!
//! 1. the repository containing the globally active pane item, when the item
//!    resolves to one,
//! 2. the repository containing the center area's active pane item,
//! 3. the repository of the only open project,
//! 4. the absent context, when no projects are open and the current context
//!    is not a startup guess,
//! 5. the repository that was active when state was last saved,
//! 6. the current context, unchanged.
//!
//! Before choosing, the pool is reconciled to every repository referenced by
//! an open project or a viewed item, whichever of them wins. Items outside any
//! repository contribute their own path to the pool.

use crate::state::SavedState;
use crate::workdir::{ContextPool, ReconcileReport, WorkdirCache, WorkdirContext, WorkdirPath};
use crate::workspace::WorkspaceSignals;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Which rule produced a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionRule {
    ActiveItem,
    CenterItem,
    SingleProject,
    NoProjects,
    SavedState,
    Unchanged,
}

#[derive(Debug)]
pub struct Resolution {
    pub context: Arc<WorkdirContext>,
    pub rule: ResolutionRule,
    pub report: ReconcileReport,
}

pub struct ContextResolver {
    cache: Arc<WorkdirCache>,
    pool: Arc<ContextPool>,
}

impl ContextResolver {
    pub fn new(cache: Arc<WorkdirCache>, pool: Arc<ContextPool>) -> Self {
        Self { cache, pool }
    }

    /// Reconcile the pool against `signals` and choose the next active context.
    ///
    /// Must run inside a serial queue task. Never fails: anything that cannot
    /// be resolved falls through to a later rule and finally to the current
    /// or the absent context.
    pub async fn resolve(
        &self,
        signals: &WorkspaceSignals,
        current: &Arc<WorkdirContext>,
        saved_state: &SavedState,
    ) -> Resolution {
        let mut desired = HashSet::new();

        let mut project_roots = Vec::with_capacity(signals.project_paths.len());
        for project in &signals.project_paths {
            let root = self
                .cache
                .find(project)
                .await
                .unwrap_or_else(|| WorkdirPath::new(project));
            desired.insert(root.clone());
            project_roots.push(root);
        }

        let active = self
            .locate_item(signals.active_path.as_deref(), &mut desired)
            .await;
        let center = self
            .locate_item(signals.center_path.as_deref(), &mut desired)
            .await;

        let report = self.pool.reconcile(&desired, saved_state).await;
        let usable = |path: &WorkdirPath| !report.failed_for(path);

        let (context, rule) = if let Some(target) = active.filter(|p| usable(p)) {
            (self.pool.get(&target), ResolutionRule::ActiveItem)
        } else if let Some(target) = center.filter(|p| usable(p)) {
            (self.pool.get(&target), ResolutionRule::CenterItem)
        } else if let [root] = project_roots.as_slice() {
            if usable(root) {
                (self.pool.get(root), ResolutionRule::SingleProject)
            } else {
                self.fallback(&project_roots, current, saved_state, &report)
            }
        } else {
            self.fallback(&project_roots, current, saved_state, &report)
        };

        debug!(rule = ?rule, context = %context, "Resolved active context");
        Resolution {
            context,
            rule,
            report,
        }
    }

    /// Rules 4 to 6.
    fn fallback(
        &self,
        project_roots: &[WorkdirPath],
        current: &Arc<WorkdirContext>,
        saved_state: &SavedState,
        report: &ReconcileReport,
    ) -> (Arc<WorkdirContext>, ResolutionRule) {
        if project_roots.is_empty() && !current.is_undetermined() {
            return (self.pool.absent(), ResolutionRule::NoProjects);
        }

        if let Some(saved) = saved_state.active_repository_path.as_deref() {
            let saved = WorkdirPath::new(saved);
            if !report.failed_for(&saved) {
                return (self.pool.get(&saved), ResolutionRule::SavedState);
            }
        }

        // A present context that just lost its residency must not stay active.
        let still_resident = current
            .working_directory()
            .map_or(true, |workdir| self.pool.get(workdir).id() == current.id());
        if still_resident {
            (Arc::clone(current), ResolutionRule::Unchanged)
        } else {
            (self.pool.absent(), ResolutionRule::Unchanged)
        }
    }

    /// Map an item path to the repository root it selects, recording the
    /// path the pool must hold for it. Unresolved items keep their raw path
    /// resident but select nothing.
    async fn locate_item(
        &self,
        item_path: Option<&Path>,
        desired: &mut HashSet<WorkdirPath>,
    ) -> Option<WorkdirPath> {
        let item_path = item_path?;
        match self.cache.find(item_path).await {
            Some(root) => {
                desired.insert(root.clone());
                Some(root)
            }
            None => {
                desired.insert(WorkdirPath::new(item_path));
                None
            }
        }
    }
}
