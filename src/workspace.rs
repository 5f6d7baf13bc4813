//! Host workspace signals consumed by the resolver.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// What the host knows about the item shown in a pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneItem {
    /// Items that are themselves about a working directory (status views, diffs).
    HasWorkingDirectory(PathBuf),
    /// Document-like items backed by a file.
    HasFilePath(PathBuf),
    Unrecognized,
}

impl PaneItem {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PaneItem::HasWorkingDirectory(path) | PaneItem::HasFilePath(path) => Some(path),
            PaneItem::Unrecognized => None,
        }
    }
}

/// The host application's project and focus state.
pub trait Workspace: Send + Sync {
    fn project_paths(&self) -> Vec<PathBuf>;

    /// Item in the globally focused pane.
    fn active_item(&self) -> Option<PaneItem>;

    /// Item in the focused pane of the center area, for hosts that track it separately.
    fn center_active_item(&self) -> Option<PaneItem> {
        None
    }

    /// Whether `path` lies inside one of the open projects.
    fn contains(&self, path: &Path) -> bool {
        self.project_paths()
            .iter()
            .any(|project| path.starts_with(project))
    }

    fn add_project_path(&self, path: &Path);

    /// Torn-down hosts no longer drive resolution.
    fn is_destroyed(&self) -> bool {
        false
    }
}

/// Workspace signals captured once at the start of a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceSignals {
    pub project_paths: Vec<PathBuf>,
    pub active_path: Option<PathBuf>,
    pub center_path: Option<PathBuf>,
}

impl WorkspaceSignals {
    pub fn capture(workspace: &dyn Workspace) -> Self {
        let item_path = |item: Option<PaneItem>| item.and_then(|item| item.path().map(Path::to_path_buf));
        Self {
            project_paths: workspace.project_paths(),
            active_path: item_path(workspace.active_item()),
            center_path: item_path(workspace.center_active_item()),
        }
    }
}

#[derive(Debug, Default)]
struct StaticState {
    projects: Vec<PathBuf>,
    active: Option<PaneItem>,
    center: Option<PaneItem>,
    destroyed: bool,
}

/// In-memory workspace whose state is set explicitly.
#[derive(Debug, Default)]
pub struct StaticWorkspace {
    state: RwLock<StaticState>,
}

impl StaticWorkspace {
    pub fn new(projects: impl IntoIterator<Item = PathBuf>) -> Self {
        let workspace = Self::default();
        for project in projects {
            workspace.add_project_path(&project);
        }
        workspace
    }

    pub fn set_active_item(&self, item: Option<PaneItem>) {
        self.state.write().active = item;
    }

    pub fn set_center_item(&self, item: Option<PaneItem>) {
        self.state.write().center = item;
    }

    pub fn remove_project_path(&self, path: &Path) {
        self.state.write().projects.retain(|project| project != path);
    }

    pub fn set_project_paths(&self, projects: Vec<PathBuf>) {
        self.state.write().projects = projects;
    }

    pub fn destroy(&self) {
        self.state.write().destroyed = true;
    }
}

impl Workspace for StaticWorkspace {
    fn project_paths(&self) -> Vec<PathBuf> {
        self.state.read().projects.clone()
    }

    fn active_item(&self) -> Option<PaneItem> {
        self.state.read().active.clone()
    }

    fn center_active_item(&self) -> Option<PaneItem> {
        self.state.read().center.clone()
    }

    fn add_project_path(&self, path: &Path) {
        let mut state = self.state.write();
        if !state.projects.iter().any(|project| project == path) {
            state.projects.push(path.to_path_buf());
        }
    }

    fn is_destroyed(&self) -> bool {
        self.state.read().destroyed
    }
}
