//! Config loading facade: defaults, files, and environment in one pass.

use super::merge::builder_with_defaults;
use super::sources::{global_file, workspace_file};
use super::WdctxConfig;
use crate::error::ContextError;
use config::{Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads [`WdctxConfig`] from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `workspace_root`.
    ///
    /// Precedence, lowest first: built-in defaults, the global config file,
    /// the workspace config files, then `WDCTX__*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<WdctxConfig, ContextError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(Self::environment());

        let config: WdctxConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(workspace_root = %workspace_root.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load a single explicit file over the defaults.
    pub fn load_from_file(path: &Path) -> Result<WdctxConfig, ContextError> {
        let config: WdctxConfig = builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    /// Defaults only.
    pub fn default() -> WdctxConfig {
        WdctxConfig::default()
    }

    fn environment() -> Environment {
        Environment::with_prefix("WDCTX")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }
}
