//! Notifications emitted by the context pool and the active-context controller.

use crate::workdir::path::WorkdirPath;

/// Capacity of the broadcast channels carrying these events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Pool-level notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// Resident membership changed during `reconcile`, `add`, `remove` or `clear`.
    MembershipChanged {
        added: Vec<WorkdirPath>,
        removed: Vec<WorkdirPath>,
    },
    WorkdirOrHeadChanged {
        context_id: u64,
        workdir: WorkdirPath,
    },
    RepositoryUpdated {
        context_id: u64,
        workdir: WorkdirPath,
    },
    ContextDestroyed {
        context_id: u64,
        workdir: Option<WorkdirPath>,
    },
}

/// Phases of one active-context update, tagged with the update's sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveContextEvent {
    Scheduled { update: u64 },
    Began { update: u64 },
    /// The presenter confirmed it rendered the new active context.
    ContextChangeRendered { update: u64 },
    /// Emitted for every update, including ones that left the active context unchanged.
    Finished { update: u64, changed: bool },
}
