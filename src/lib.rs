//! wdctx: Working-Directory Context Resolution
//!
//! Decides which version-controlled working directory a multi-project
//! workspace is "in", keeps one repository context per relevant working
//! directory, and swaps the active context in response to workspace changes.
//! Every context-mutating step runs on a single serial task lane.

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod git;
pub mod logging;
pub mod queue;
pub mod repository;
pub mod resolver;
pub mod state;
pub mod workdir;
pub mod workspace;

pub use config::{ConfigLoader, WdctxConfig};
pub use controller::{
    ActiveContextController, ControllerDeps, ControllerState, NoopPresenter, Presenter,
};
pub use error::ContextError;
pub use events::{ActiveContextEvent, PoolEvent};
pub use queue::{PushOptions, QueueStats, SerialTaskQueue, TaskHandle};
pub use repository::{Repository, RepositoryFactory, RepositoryState};
pub use resolver::{ContextResolver, Resolution, ResolutionRule};
pub use state::{SavedState, StateStore};
pub use workdir::{
    ContextPool, GuessCriteria, ProgressSnapshot, ReconcileReport, WorkdirCache, WorkdirContext,
    WorkdirPath,
};
pub use workspace::{PaneItem, StaticWorkspace, Workspace, WorkspaceSignals};
