//! CLI route: single route table and run context.

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_find_output, format_resolution_output};
use crate::config::{ConfigLoader, WdctxConfig};
use crate::controller::{ActiveContextController, ControllerDeps, NoopPresenter};
use crate::error::ContextError;
use crate::git::GitRepositoryFactory;
use crate::state::StateStore;
use crate::workdir::{GuessCriteria, WorkdirCache};
use crate::workspace::{PaneItem, StaticWorkspace};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runtime context for CLI execution: workspace root, loaded config, and state store.
pub struct RunContext {
    workspace_root: PathBuf,
    config: WdctxConfig,
    state: StateStore,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ContextError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        let state = StateStore::resolve(config.state.file.as_deref())?;
        Ok(Self {
            workspace_root,
            config,
            state,
        })
    }

    pub fn config(&self) -> &WdctxConfig {
        &self.config
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, ContextError> {
        match command {
            Commands::Find { path, format } => self.handle_find(path, format).await,
            Commands::Resolve {
                projects,
                active,
                center,
                no_save,
                format,
            } => {
                self.handle_resolve(projects, active.as_deref(), center.as_deref(), *no_save, format)
                    .await
            }
            Commands::Init { path } => self.handle_init(path).await,
            Commands::Clone { url, path } => self.handle_clone(url, path).await,
            Commands::Config => toml::to_string_pretty(&self.config)
                .map_err(|e| ContextError::Config(format!("Failed to render config: {}", e))),
        }
    }

    async fn handle_find(&self, path: &Path, format: &str) -> Result<String, ContextError> {
        let path = self.absolute(path);
        let cache = WorkdirCache::new(self.config.cache.max_entries);
        let root = cache.find(&path).await;
        format_find_output(&path, root.as_ref(), format)
    }

    async fn handle_resolve(
        &self,
        projects: &[PathBuf],
        active: Option<&Path>,
        center: Option<&Path>,
        no_save: bool,
        format: &str,
    ) -> Result<String, ContextError> {
        let projects: Vec<PathBuf> = projects.iter().map(|p| self.absolute(p)).collect();
        let workspace = Arc::new(StaticWorkspace::new(projects.clone()));
        workspace.set_active_item(active.map(|p| PaneItem::HasFilePath(self.absolute(p))));
        workspace.set_center_item(center.map(|p| PaneItem::HasFilePath(self.absolute(p))));

        let controller = self.controller(workspace, projects.len());
        let saved_state = self.state.load()?;
        controller.schedule_update(saved_state).await?;

        let active = controller.active_context();
        let output = format_resolution_output(&active, &controller.pool().contexts(), format)?;

        if !no_save {
            self.state.save(&controller.serialize())?;
            info!(state_file = %self.state.path().display(), "Saved state");
        }
        controller.deactivate().await?;
        Ok(output)
    }

    async fn handle_init(&self, path: &Path) -> Result<String, ContextError> {
        let path = self.absolute(path);
        let controller = self.controller(Arc::new(StaticWorkspace::default()), 0);
        controller.create_repository_for_project_path(&path).await?;
        let active = controller.active_context();
        controller.deactivate().await?;
        Ok(format!("Initialized repository in {}", active))
    }

    async fn handle_clone(&self, url: &str, path: &Path) -> Result<String, ContextError> {
        let path = self.absolute(path);
        let controller = self.controller(Arc::new(StaticWorkspace::default()), 0);
        controller.clone_repository_for_project_path(url, &path).await?;
        let active = controller.active_context();
        controller.deactivate().await?;
        Ok(format!("Cloned {} into {}", url, active))
    }

    fn controller(
        &self,
        workspace: Arc<StaticWorkspace>,
        project_path_count: usize,
    ) -> ActiveContextController {
        ActiveContextController::new(
            ControllerDeps {
                workspace,
                factory: Arc::new(GitRepositoryFactory),
                presenter: Arc::new(NoopPresenter),
            },
            &self.config,
            GuessCriteria {
                project_path_count,
                init_path_count: 0,
            },
        )
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}
