//! Repository Root Cache
//!
//! Memoizes the mapping from an arbitrary filesystem path to the root of the
//! repository containing it. A recorded "no repository" answer is as sticky as
//! a recorded root, so callers that create a repository must `invalidate` the
//! path afterwards.

use crate::error::ContextError;
use crate::workdir::path::{absolutize, WorkdirPath};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the directory that marks a repository root.
pub const METADATA_DIR: &str = ".git";

pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Default)]
struct CacheEntries {
    roots: HashMap<PathBuf, Option<WorkdirPath>>,
    /// Insertion order, oldest first.
    order: VecDeque<PathBuf>,
}

pub struct WorkdirCache {
    entries: RwLock<CacheEntries>,
    max_entries: usize,
}

impl Default for WorkdirCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl WorkdirCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(CacheEntries::default()),
            max_entries: max_entries.max(1),
        }
    }

    /// Find the repository root containing `path`.
    ///
    /// Hits return the recorded answer, which may be `None`. Misses probe the
    /// filesystem and record the result under the path exactly as given. A
    /// failed probe yields `None` and is not recorded.
    pub async fn find(&self, path: impl AsRef<Path>) -> Option<WorkdirPath> {
        let path = path.as_ref();
        if let Some(hit) = self.entries.read().roots.get(path) {
            debug!(path = %path.display(), root = ?hit, "Repository root cache hit");
            return hit.clone();
        }

        match probe(path).await {
            Ok(root) => {
                debug!(path = %path.display(), root = ?root, "Repository root cache miss");
                self.record(path.to_path_buf(), root.clone());
                root
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Repository root probe failed");
                None
            }
        }
    }

    /// Forget the recorded answer for exactly `path`.
    pub fn invalidate(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.entries.write();
        if entries.roots.remove(path).is_some() {
            entries.order.retain(|p| p != path);
            debug!(path = %path.display(), "Invalidated repository root cache entry");
        }
    }

    /// Forget every recorded answer for `path` and the paths beneath it.
    ///
    /// Needed once a repository appears at `path`: documents under it that
    /// were probed earlier still carry the old answer.
    pub fn invalidate_under(&self, path: impl AsRef<Path>) {
        let base = absolutize(path.as_ref());
        let mut entries = self.entries.write();
        let before = entries.roots.len();
        entries
            .roots
            .retain(|cached, _| !absolutize(cached).starts_with(&base));
        let CacheEntries { roots, order } = &mut *entries;
        order.retain(|cached| roots.contains_key(cached));
        let dropped = before - roots.len();
        if dropped > 0 {
            debug!(path = %base.display(), dropped, "Invalidated repository root cache subtree");
        }
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.roots.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, path: PathBuf, root: Option<WorkdirPath>) {
        let mut entries = self.entries.write();
        // Concurrent probes of the same path compute the same answer; last write wins.
        if entries.roots.insert(path.clone(), root).is_none() {
            entries.order.push_back(path);
        }
        while entries.roots.len() > self.max_entries {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.roots.remove(&oldest);
        }
    }
}

/// Walk from `path` towards the filesystem root looking for repository metadata.
async fn probe(path: &Path) -> Result<Option<WorkdirPath>, ContextError> {
    let start = absolutize(path);

    // Paths inside the metadata directory belong to the repository around it.
    let mut prefix = PathBuf::new();
    for component in start.components() {
        if component.as_os_str() == METADATA_DIR {
            return Ok(Some(WorkdirPath::new(&prefix)));
        }
        prefix.push(component.as_os_str());
    }

    let start_is_dir = tokio::fs::metadata(&start)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    let mut current = if start_is_dir {
        Some(start.as_path())
    } else {
        start.parent()
    };

    while let Some(dir) = current {
        match tokio::fs::symlink_metadata(dir.join(METADATA_DIR)).await {
            Ok(_) => return Ok(Some(WorkdirPath::new(dir))),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ContextError::ProbeFailed {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
        current = dir.parent();
    }

    Ok(None)
}
