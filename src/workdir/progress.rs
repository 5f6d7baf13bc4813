//! Merge-conflict resolution progress for one working directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable form of [`ResolutionProgress`], keyed by conflicted file path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Revision the marker counts were recorded against.
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub paths: BTreeMap<String, usize>,
}

/// Remaining conflict markers per conflicted file.
#[derive(Debug, Clone, Default)]
pub struct ResolutionProgress {
    revision: String,
    markers: BTreeMap<String, usize>,
}

impl ResolutionProgress {
    pub fn new(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            markers: BTreeMap::new(),
        }
    }

    /// Restore from a snapshot, discarding it if it was taken at another revision.
    pub fn restore(revision: impl Into<String>, snapshot: &ProgressSnapshot) -> Self {
        let revision = revision.into();
        let markers = if snapshot.revision == revision {
            snapshot.paths.clone()
        } else {
            BTreeMap::new()
        };
        Self { revision, markers }
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Record the remaining marker count for `path`. Returns whether it changed.
    pub fn report_marker_count(&mut self, path: &str, count: usize) -> bool {
        let previous = self.markers.insert(path.to_string(), count);
        previous != Some(count)
    }

    pub fn remaining(&self, path: &str) -> Option<usize> {
        self.markers.get(path).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            revision: self.revision.clone(),
            paths: self.markers.clone(),
        }
    }
}
