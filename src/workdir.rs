//! Working-directory domain: canonical paths, the root cache, contexts, and the pool.

pub mod cache;
pub mod context;
pub mod path;
pub mod pool;
pub mod progress;

pub use cache::WorkdirCache;
pub use context::{ContextKind, GuessCriteria, WorkdirContext};
pub use path::WorkdirPath;
pub use pool::{ContextPool, ReconcileReport};
pub use progress::{ProgressSnapshot, ResolutionProgress};
