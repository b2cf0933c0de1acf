//! Queue admission planning and status aggregation.
//!
//! The queue manager enforces a per-user depth cap: when a user's queue is
//! full, the oldest pending operations are evicted to make room for the new
//! one. Planning is pure; the storage layer executes the plan with
//! conditional deletes so an operation claimed by a concurrent sync pass
//! (already `Syncing`) is never evicted.

use crate::{OpStatus, OperationId, Timestamp};
use serde::{Deserialize, Serialize};

/// Default per-user queue depth cap.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Per-user queue capacity policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    /// Maximum pending + syncing operations a single user may hold.
    pub max_depth: usize,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_QUEUE_SIZE,
        }
    }
}

/// The slice of an operation the admission planner needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: OperationId,
    pub status: OpStatus,
    pub created_at: Timestamp,
}

impl QueueEntry {
    pub fn new(id: impl Into<OperationId>, status: OpStatus, created_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            status,
            created_at,
        }
    }
}

/// Decision for admitting one new operation into a user's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Capacity available; insert directly.
    Admit,
    /// Evict these pending operations (oldest first), then insert.
    EvictThenAdmit(Vec<OperationId>),
    /// Every occupied slot is mid-sync; nothing evictable frees space.
    Reject,
}

impl QueuePolicy {
    /// Plan admission of one new operation given the user's active entries
    /// (their `Pending` and `Syncing` operations).
    ///
    /// Only pending entries are evictable; an entry that a sync pass has
    /// already flipped to `Syncing` is held until it reaches a terminal
    /// status.
    pub fn plan_admission(&self, active: &[QueueEntry]) -> Admission {
        if active.len() < self.max_depth {
            return Admission::Admit;
        }

        let needed = active.len() + 1 - self.max_depth;

        let mut pending: Vec<&QueueEntry> = active
            .iter()
            .filter(|entry| entry.status == OpStatus::Pending)
            .collect();
        if pending.len() < needed {
            return Admission::Reject;
        }

        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        Admission::EvictThenAdmit(
            pending
                .into_iter()
                .take(needed)
                .map(|entry| entry.id.clone())
                .collect(),
        )
    }
}

/// Read-only aggregate of a user's queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// All operations for the user, any status
    pub total: u64,
    pub pending: u64,
    pub syncing: u64,
    pub completed: u64,
    pub failed: u64,
    pub conflict: u64,
    /// Enqueue time of the oldest pending operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_pending_at: Option<Timestamp>,
    /// Whether a sync pass is currently in flight
    pub is_syncing: bool,
}

impl QueueStatus {
    /// Build a status summary from per-status counts.
    pub fn from_counts(
        counts: &[(OpStatus, u64)],
        oldest_pending_at: Option<Timestamp>,
        is_syncing: bool,
    ) -> Self {
        let mut status = QueueStatus {
            oldest_pending_at,
            is_syncing,
            ..QueueStatus::default()
        };
        for &(kind, count) in counts {
            status.total += count;
            match kind {
                OpStatus::Pending => status.pending += count,
                OpStatus::Syncing => status.syncing += count,
                OpStatus::Completed => status.completed += count,
                OpStatus::Failed => status.failed += count,
                OpStatus::Conflict => status.conflict += count,
            }
        }
        status
    }

    /// Operations occupying queue capacity (pending + syncing).
    pub fn in_flight(&self) -> u64 {
        self.pending + self.syncing
    }
}
