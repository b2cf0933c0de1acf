//! # Courier Engine
//!
//! The deterministic core of Courier's offline operation synchronization.
//!
//! CRM clients keep working while disconnected; every mutation they make is
//! captured as a queued operation and replayed against the authoritative
//! store once connectivity returns. This crate holds the pure logic of that
//! replay: the operation state machine, retry/backoff policy, queue
//! admission and eviction planning, conflict records, autosave snapshots,
//! and payload validation.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of databases, clocks, or tasks
//! - **Deterministic**: every decision is a pure function of its inputs,
//!   with time passed in explicitly
//! - **Testable**: the full lifecycle can be walked without mocks
//!
//! ## Core Concepts
//!
//! ### Queued Operations
//!
//! A [`QueuedOperation`] records one offline mutation: which entity it
//! targets ([`EntityKind`]), what kind of change it is ([`OperationKind`]),
//! the opaque payload, and lifecycle bookkeeping. Status moves through
//! `Pending -> Syncing -> {Completed | Conflict | Failed}`, with
//! `Syncing -> Pending` requeues governed by the linear [`RetryPolicy`].
//!
//! ### Queue Admission
//!
//! [`QueuePolicy::plan_admission`] enforces the per-user depth cap by
//! choosing the oldest pending operations to evict; operations mid-sync are
//! never evicted.
//!
//! ### Conflicts
//!
//! When replaying a creation collides with an existing authoritative record
//! (matched on a natural key such as phone + email), the synchronizer files
//! a [`ConflictRecord`] holding both sides. Conflicts wait for a person;
//! nothing in the engine resolves them automatically.
//!
//! ### Autosave
//!
//! An [`AutosaveSnapshot`] is a versioned, TTL-bound draft of in-progress
//! edits, independent of the queue. One live snapshot per
//! (entity, entity_id, user) scope; every write bumps the version.
//!
//! ## Quick Start
//!
//! ```rust
//! use courier_engine::{
//!     EntityKind, OperationKind, QueuedOperation, RetryDisposition, RetryPolicy, SchemaSet,
//! };
//! use serde_json::json;
//!
//! // Validate an offline mutation the way the queue manager does.
//! let schemas = SchemaSet::crm_default();
//! let payload = json!({"phone": "9876543210", "email": "a@x.com"});
//! schemas
//!     .validate(EntityKind::Lead, OperationKind::Create, &payload)
//!     .unwrap();
//!
//! // Queue it, claim it, and record a transient handler failure.
//! let mut op = QueuedOperation::new(
//!     "op-1",
//!     "user-1",
//!     EntityKind::Lead,
//!     OperationKind::Create,
//!     payload,
//!     1_706_745_600_000,
//! );
//! op.begin_sync(1_706_745_605_000).unwrap();
//!
//! let policy = RetryPolicy::default();
//! let disposition = op
//!     .record_failure("store unavailable", 1_706_745_605_000, &policy)
//!     .unwrap();
//!
//! // First failure: requeued, due again five minutes out.
//! assert_eq!(op.retry_count, 1);
//! assert_eq!(
//!     disposition,
//!     RetryDisposition::Retry {
//!         next_retry_at: 1_706_745_605_000 + 300_000
//!     }
//! );
//! ```

pub mod autosave;
pub mod conflict;
pub mod entity;
pub mod error;
pub mod operation;
pub mod queue;
pub mod retry;
pub mod schema;

// Re-export main types at crate root
pub use autosave::{AutosaveSnapshot, DEFAULT_AUTOSAVE_TTL_MS};
pub use conflict::{ConflictRecord, ConflictStatus, Resolution};
pub use entity::{EntityKind, OperationKind};
pub use error::{Error, Result};
pub use operation::{OpStatus, QueuedOperation, RetryDisposition};
pub use queue::{Admission, QueueEntry, QueuePolicy, QueueStatus, DEFAULT_MAX_QUEUE_SIZE};
pub use retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_UNIT_MS};
pub use schema::{FieldDef, FieldType, PayloadSchema, SchemaSet};

/// Type aliases for clarity
pub type OperationId = String;
pub type ConflictId = String;
pub type SnapshotId = String;
pub type UserId = String;
pub type EntityId = String;
pub type Version = u32;
pub type Timestamp = i64;
