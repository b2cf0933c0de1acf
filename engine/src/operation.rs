//! Queued operations and their status state machine.
//!
//! A mutation made while a client was disconnected is captured as a
//! [`QueuedOperation`] and replayed later by the background synchronizer.
//! All status transitions are checked here, so storage layers and workers
//! stay thin: they persist whatever state these methods produce.
//!
//! The lifecycle is `Pending -> Syncing -> {Completed | Conflict | Failed}`,
//! with `Syncing -> Pending` requeues for transient handler failures until
//! the retry policy is exhausted.

use crate::{
    EntityKind, Error, OperationId, OperationKind, Result, RetryPolicy, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    /// Waiting to be picked up by a sync pass.
    Pending,
    /// Claimed by the current sync pass.
    Syncing,
    /// Applied against the authoritative store.
    Completed,
    /// Retries exhausted; requires no further automatic action.
    Failed,
    /// Collided with an existing authoritative record; awaiting resolution.
    Conflict,
}

impl OpStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OpStatus; 5] = [
        OpStatus::Pending,
        OpStatus::Syncing,
        OpStatus::Completed,
        OpStatus::Failed,
        OpStatus::Conflict,
    ];

    /// Stable string tag, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpStatus::Pending => "pending",
            OpStatus::Syncing => "syncing",
            OpStatus::Completed => "completed",
            OpStatus::Failed => "failed",
            OpStatus::Conflict => "conflict",
        }
    }

    /// Whether this status ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OpStatus::Completed | OpStatus::Failed | OpStatus::Conflict
        )
    }
}

impl std::fmt::Display for OpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OpStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OpStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidPayload(format!("unknown status: {s}")))
    }
}

/// What happened to a failing operation after applying the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Requeued; due again at the embedded timestamp.
    Retry { next_retry_at: Timestamp },
    /// Retries exhausted; the operation is terminally failed.
    Exhausted,
}

/// A mutation captured offline, queued for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// Unique identifier for this operation
    pub id: OperationId,
    /// User whose client produced the mutation
    pub user_id: UserId,
    /// Entity kind the mutation targets
    pub entity: EntityKind,
    /// Kind of mutation
    pub operation: OperationKind,
    /// Mutation payload, opaque to the core and validated at enqueue time
    pub payload: serde_json::Value,
    /// Current lifecycle status
    pub status: OpStatus,
    /// Requeues consumed so far
    pub retry_count: u32,
    /// Handler result summary, recorded on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Last handler error, recorded on requeue or terminal failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the operation was enqueued (milliseconds since epoch)
    pub created_at: Timestamp,
    /// When the current or last sync attempt started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_started_at: Option<Timestamp>,
    /// When the operation reached Completed or Conflict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_completed_at: Option<Timestamp>,
    /// When the operation was terminally failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<Timestamp>,
    /// Earliest instant a requeued operation becomes due again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<Timestamp>,
}

impl QueuedOperation {
    /// Create a new pending operation.
    pub fn new(
        id: impl Into<OperationId>,
        user_id: impl Into<UserId>,
        entity: EntityKind,
        operation: OperationKind,
        payload: serde_json::Value,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            entity,
            operation,
            payload,
            status: OpStatus::Pending,
            retry_count: 0,
            result: None,
            error_message: None,
            created_at,
            sync_started_at: None,
            sync_completed_at: None,
            failed_at: None,
            next_retry_at: None,
        }
    }

    /// Whether a sync pass may pick this operation up at `now`.
    ///
    /// Pending operations with a future `next_retry_at` are skipped, not
    /// dropped; they become due again once the backoff window passes.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == OpStatus::Pending && self.next_retry_at.map_or(true, |due| due <= now)
    }

    /// Transition `Pending -> Syncing` when a pass claims the operation.
    pub fn begin_sync(&mut self, now: Timestamp) -> Result<()> {
        self.guard(OpStatus::Pending, OpStatus::Syncing)?;
        self.status = OpStatus::Syncing;
        self.sync_started_at = Some(now);
        Ok(())
    }

    /// Transition `Syncing -> Completed`, recording the handler summary.
    pub fn complete(&mut self, summary: Option<serde_json::Value>, now: Timestamp) -> Result<()> {
        self.guard(OpStatus::Syncing, OpStatus::Completed)?;
        self.status = OpStatus::Completed;
        self.sync_completed_at = Some(now);
        self.result = summary;
        self.error_message = None;
        Ok(())
    }

    /// Transition `Syncing -> Conflict` when the handler reported a collision.
    pub fn mark_conflict(&mut self, now: Timestamp) -> Result<()> {
        self.guard(OpStatus::Syncing, OpStatus::Conflict)?;
        self.status = OpStatus::Conflict;
        self.sync_completed_at = Some(now);
        Ok(())
    }

    /// Apply the retry rule after a transient handler failure.
    ///
    /// While `retry_count < max_retries` the operation is requeued
    /// (`Syncing -> Pending`) with an incremented count and a linearly
    /// backed-off `next_retry_at`; once the budget is spent it is terminally
    /// failed. The invariant `retry_count <= max_retries` holds throughout.
    pub fn record_failure(
        &mut self,
        error: &str,
        now: Timestamp,
        policy: &RetryPolicy,
    ) -> Result<RetryDisposition> {
        if self.status != OpStatus::Syncing {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: OpStatus::Pending,
            });
        }

        self.error_message = Some(error.to_string());

        if self.retry_count < policy.max_retries {
            self.retry_count += 1;
            let next_retry_at = policy.next_retry_at(self.retry_count, now);
            self.status = OpStatus::Pending;
            self.next_retry_at = Some(next_retry_at);
            Ok(RetryDisposition::Retry { next_retry_at })
        } else {
            self.status = OpStatus::Failed;
            self.failed_at = Some(now);
            Ok(RetryDisposition::Exhausted)
        }
    }

    fn guard(&self, expected: OpStatus, to: OpStatus) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }
}
