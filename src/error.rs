//! Error types for working-directory context resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the cache, pool, queue, and controller.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Failed to probe {path:?} for a repository root: {source}")]
    ProbeFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to construct repository for {path}: {reason}")]
    RepositoryConstruction { path: String, reason: String },

    #[error("Context is no longer resident: {0}")]
    StaleContext(String),

    #[error("Repository operation failed: {0}")]
    Repository(String),

    #[error("Queued task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Saved state error: {0}")]
    State(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ContextError {
    fn from(err: serde_json::Error) -> Self {
        ContextError::State(err.to_string())
    }
}
