//! Conflict records for collisions detected during replay.
//!
//! When a handler finds an authoritative record matching the natural key of
//! an offline creation, the synchronizer files a [`ConflictRecord`] carrying
//! both sides and parks the operation in `Conflict` status. Records are only
//! ever resolved through the resolver API, by a person; resolution is
//! recorded for audit and does not re-apply the offline payload.

use crate::{ConflictId, EntityKind, Error, OperationKind, Result, Timestamp};
use serde::{Deserialize, Serialize};

/// Payload fields consulted when scoping conflicts to a user.
const OWNERSHIP_FIELDS: [&str; 3] = ["user_id", "assigned_to", "created_by"];

/// Resolution state of a conflict record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    PendingResolution,
    Resolved,
}

impl ConflictStatus {
    /// Stable string tag, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::PendingResolution => "pending_resolution",
            ConflictStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConflictStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending_resolution" => Ok(ConflictStatus::PendingResolution),
            "resolved" => Ok(ConflictStatus::Resolved),
            other => Err(Error::InvalidPayload(format!(
                "unknown conflict status: {other}"
            ))),
        }
    }
}

/// How a person chose to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    UseOffline,
    UseServer,
    Merge,
}

impl Resolution {
    /// Stable string tag, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::UseOffline => "use_offline",
            Resolution::UseServer => "use_server",
            Resolution::Merge => "merge",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "use_offline" => Ok(Resolution::UseOffline),
            "use_server" => Ok(Resolution::UseServer),
            "merge" => Ok(Resolution::Merge),
            other => Err(Error::InvalidPayload(format!(
                "unknown resolution: {other}"
            ))),
        }
    }
}

/// A detected collision between an offline mutation and the authoritative
/// store, awaiting manual resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    /// Unique identifier for this conflict
    pub id: ConflictId,
    /// Entity kind of the rejected mutation
    pub entity: EntityKind,
    /// Operation kind of the rejected mutation
    pub operation: OperationKind,
    /// The rejected offline payload
    pub offline_data: serde_json::Value,
    /// Identifying fields of the colliding authoritative record
    pub server_data: serde_json::Value,
    /// Resolution state
    pub status: ConflictStatus,
    /// Chosen resolution, once resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Who resolved it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    /// When it was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    /// When the collision was detected
    pub created_at: Timestamp,
    /// When the sweeper may delete this record, resolved or not
    pub expires_at: Timestamp,
}

impl ConflictRecord {
    /// File a new conflict with a lifetime of `ttl_ms` from `now`.
    pub fn new(
        id: impl Into<ConflictId>,
        entity: EntityKind,
        operation: OperationKind,
        offline_data: serde_json::Value,
        server_data: serde_json::Value,
        now: Timestamp,
        ttl_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            entity,
            operation,
            offline_data,
            server_data,
            status: ConflictStatus::PendingResolution,
            resolution: None,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    /// Record a manual resolution. Resolving twice is an error.
    pub fn resolve(
        &mut self,
        resolution: Resolution,
        resolved_by: impl Into<String>,
        now: Timestamp,
    ) -> Result<()> {
        if self.status == ConflictStatus::Resolved {
            return Err(Error::AlreadyResolved(self.id.clone()));
        }
        self.status = ConflictStatus::Resolved;
        self.resolution = Some(resolution);
        self.resolved_by = Some(resolved_by.into());
        self.resolved_at = Some(now);
        Ok(())
    }

    /// Whether the sweeper may delete this record at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    /// Whether either payload names `user_id` in one of its ownership
    /// fields. Conflicts carry no user column of their own; scoping works
    /// off the payloads, which in this domain always carry ownership.
    pub fn belongs_to(&self, user_id: &str) -> bool {
        [&self.offline_data, &self.server_data]
            .into_iter()
            .any(|data| {
                OWNERSHIP_FIELDS
                    .iter()
                    .any(|field| data.get(field).and_then(|v| v.as_str()) == Some(user_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ConflictRecord {
        ConflictRecord::new(
            "conf-1",
            EntityKind::Lead,
            OperationKind::Create,
            json!({"phone": "123", "email": "a@b.com", "user_id": "user-1"}),
            json!({"id": "L-42", "phone": "123", "email": "a@b.com"}),
            1_000,
            86_400_000,
        )
    }

    #[test]
    fn new_conflict_is_pending_resolution() {
        let conflict = sample();
        assert_eq!(conflict.status, ConflictStatus::PendingResolution);
        assert_eq!(conflict.expires_at, 1_000 + 86_400_000);
        assert!(conflict.resolution.is_none());
    }

    #[test]
    fn resolve_records_who_and_when() {
        let mut conflict = sample();
        conflict
            .resolve(Resolution::UseServer, "manager-7", 5_000)
            .unwrap();

        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert_eq!(conflict.resolution, Some(Resolution::UseServer));
        assert_eq!(conflict.resolved_by.as_deref(), Some("manager-7"));
        assert_eq!(conflict.resolved_at, Some(5_000));
    }

    #[test]
    fn resolving_twice_is_rejected() {
        let mut conflict = sample();
        conflict
            .resolve(Resolution::UseOffline, "manager-7", 5_000)
            .unwrap();

        let err = conflict
            .resolve(Resolution::Merge, "manager-8", 6_000)
            .unwrap_err();
        assert_eq!(err, Error::AlreadyResolved("conf-1".to_string()));

        // First resolution stands.
        assert_eq!(conflict.resolution, Some(Resolution::UseOffline));
        assert_eq!(conflict.resolved_by.as_deref(), Some("manager-7"));
    }

    #[test]
    fn expiry_applies_regardless_of_resolution() {
        let mut conflict = sample();
        assert!(!conflict.is_expired(1_000 + 86_399_999));
        assert!(conflict.is_expired(1_000 + 86_400_000));

        conflict
            .resolve(Resolution::Merge, "manager-7", 2_000)
            .unwrap();
        assert!(conflict.is_expired(1_000 + 86_400_000));
    }

    #[test]
    fn ownership_scoping_checks_both_payloads() {
        let conflict = sample();
        assert!(conflict.belongs_to("user-1"));
        assert!(!conflict.belongs_to("user-2"));

        let server_owned = ConflictRecord::new(
            "conf-2",
            EntityKind::Task,
            OperationKind::Update,
            json!({"id": "T-1"}),
            json!({"id": "T-1", "assigned_to": "user-3"}),
            1_000,
            1_000,
        );
        assert!(server_owned.belongs_to("user-3"));
    }

    #[test]
    fn serialization_roundtrip() {
        let mut conflict = sample();
        conflict
            .resolve(Resolution::UseOffline, "manager-7", 5_000)
            .unwrap();

        let json = serde_json::to_string(&conflict).unwrap();
        assert!(json.contains("\"resolution\":\"use_offline\""));
        assert!(json.contains("offlineData"));

        let parsed: ConflictRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(conflict, parsed);
    }
}
