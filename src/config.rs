//! Configuration System
//!
//! Layered configuration for the root cache, saved-state location, and logging.
//! Built-in defaults are overridden by the global config file, then by the
//! workspace's `.wdctx/` files, then by `WDCTX__*` environment variables.

use crate::error::ContextError;
use crate::logging::LoggingConfig;
use crate::workdir::cache::DEFAULT_MAX_ENTRIES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::workspace_file::WORKSPACE_CONFIG_DIR;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WdctxConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Root cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on memoized path lookups
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

/// Saved-state settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    /// State file; the platform data directory is used when unset
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl WdctxConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.cache.max_entries == 0 {
            return Err(ContextError::Config(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if let Some(file) = &self.state.file {
            if file.as_os_str().is_empty() {
                return Err(ContextError::Config("state.file cannot be empty".to_string()));
            }
        }
        self.logging.validate()
    }
}
