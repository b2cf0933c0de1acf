//! Versioned draft snapshots for crash recovery.
//!
//! Autosave is a lighter-weight write path than the operation queue: it
//! captures in-progress edits so a crashed or reloaded client can restore
//! its form state. Snapshots never become queued mutations. Each
//! (entity, entity_id, user) scope holds at most one live snapshot whose
//! version increments on every write and whose TTL is refreshed on every
//! write.

use crate::{EntityKind, SnapshotId, Timestamp, Version};
use serde::{Deserialize, Serialize};

/// Default snapshot lifetime: 24 hours.
pub const DEFAULT_AUTOSAVE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// A user- and entity-scoped draft snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveSnapshot {
    /// Unique identifier for this snapshot
    pub id: SnapshotId,
    /// Entity kind being drafted
    pub entity: EntityKind,
    /// Identifier of the entity being drafted ("new" drafts use a client key)
    pub entity_id: String,
    /// Owner of the draft
    pub user_id: String,
    /// Draft form state, opaque to the core
    pub data: serde_json::Value,
    /// Monotonic version within this snapshot's scope
    pub version: Version,
    /// When the scope was first autosaved
    pub created_at: Timestamp,
    /// When the snapshot expires; refreshed on every write
    pub expires_at: Timestamp,
}

impl AutosaveSnapshot {
    /// Create the first snapshot for a scope, at version 1.
    pub fn new(
        id: impl Into<SnapshotId>,
        entity: EntityKind,
        entity_id: impl Into<String>,
        user_id: impl Into<String>,
        data: serde_json::Value,
        now: Timestamp,
        ttl_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            entity,
            entity_id: entity_id.into(),
            user_id: user_id.into(),
            data,
            version: 1,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    /// Replace the draft data in place: bump the version and push the
    /// expiry out to `now + ttl_ms`. `created_at` keeps the original write.
    pub fn refresh(&mut self, data: serde_json::Value, now: Timestamp, ttl_ms: i64) {
        self.data = data;
        self.version += 1;
        self.expires_at = now.saturating_add(ttl_ms);
    }

    /// Whether the snapshot is past its TTL at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}
