//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ContextError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ContextError) -> String {
    match e {
        ContextError::RepositoryConstruction { path, reason } => {
            format!("Cannot open {} as a working directory: {}", path, reason)
        }
        other => other.to_string(),
    }
}
