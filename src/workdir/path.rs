//! Working-directory path canonicalization and normalization

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Canonical absolute path identifying a repository root.
///
/// Two `WorkdirPath`s are equal when their normalized string forms are equal:
/// symlinks are resolved when the path exists, `.`/`..` are folded lexically
/// when it does not, Unicode is normalized to NFC and trailing separators are
/// stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkdirPath(String);

impl WorkdirPath {
    /// Canonicalize through the filesystem, falling back to lexical
    /// normalization for paths that do not exist (yet).
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let resolved = dunce::canonicalize(path).unwrap_or_else(|_| absolutize(path));
        Self(normalize_path_string(&resolved.to_string_lossy()))
    }

    /// Normalize without touching the filesystem.
    pub fn lexical(path: impl AsRef<Path>) -> Self {
        Self(normalize_path_string(
            &absolutize(path.as_ref()).to_string_lossy(),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    /// Whether `path` lies at or beneath this working directory.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(self.as_path())
    }
}

impl fmt::Display for WorkdirPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for WorkdirPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

/// Normalize a path string (NFC, no trailing separators except root).
pub fn normalize_path_string(path: &str) -> String {
    let mut result: String = path.nfc().collect();
    if result.len() > 1 {
        while result.ends_with('/') || result.ends_with('\\') {
            result.pop();
        }
    }
    result
}

/// Make `path` absolute against the current directory and fold `.` and `..`.
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
