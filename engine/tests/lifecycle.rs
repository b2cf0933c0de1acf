//! Lifecycle tests for courier-engine
//!
//! These tests walk whole-queue scenarios across modules: retry exhaustion,
//! capacity enforcement, conflict resolution, and autosave versioning.

use courier_engine::{
    Admission, AutosaveSnapshot, ConflictRecord, ConflictStatus, EntityKind, OpStatus,
    OperationKind, QueueEntry, QueuePolicy, QueueStatus, QueuedOperation, Resolution,
    RetryDisposition, RetryPolicy, SchemaSet,
};
use proptest::prelude::*;
use serde_json::json;

fn lead_create(id: &str, user: &str, created_at: i64) -> QueuedOperation {
    QueuedOperation::new(
        id,
        user,
        EntityKind::Lead,
        OperationKind::Create,
        json!({"phone": "9876543210", "email": "a@x.com"}),
        created_at,
    )
}

// ============================================================================
// Retry / Backoff
// ============================================================================

#[test]
fn always_failing_handler_terminates_after_max_retries() {
    let policy = RetryPolicy::default();
    let mut op = lead_create("op-1", "user-1", 0);
    let mut now = 0i64;
    let mut requeues = 0u32;

    loop {
        assert!(op.is_due(now));
        op.begin_sync(now).unwrap();

        match op.record_failure("handler raised", now, &policy).unwrap() {
            RetryDisposition::Retry { next_retry_at } => {
                requeues += 1;
                // Linear backoff: the n-th retry lands n units out.
                assert_eq!(next_retry_at, now + i64::from(op.retry_count) * 300_000);
                assert!(!op.is_due(now));
                now = next_retry_at;
            }
            RetryDisposition::Exhausted => break,
        }
    }

    assert_eq!(requeues, 3);
    assert_eq!(op.retry_count, 3);
    assert_eq!(op.status, OpStatus::Failed);
    assert!(op.failed_at.is_some());
    assert_eq!(op.error_message.as_deref(), Some("handler raised"));
}

#[test]
fn operation_recovers_when_a_later_attempt_succeeds() {
    let policy = RetryPolicy::default();
    let mut op = lead_create("op-1", "user-1", 0);

    op.begin_sync(0).unwrap();
    op.record_failure("timeout", 0, &policy).unwrap();

    let due = op.next_retry_at.unwrap();
    op.begin_sync(due).unwrap();
    op.complete(Some(json!({"lead_id": "L-1"})), due + 5).unwrap();

    assert_eq!(op.status, OpStatus::Completed);
    assert_eq!(op.retry_count, 1);
    assert!(op.error_message.is_none());
}

// ============================================================================
// Queue Capacity
// ============================================================================

#[test]
fn queue_depth_never_exceeds_cap_under_sustained_enqueues() {
    let policy = QueuePolicy { max_depth: 5 };
    let mut active: Vec<QueueEntry> = Vec::new();

    for n in 0..50i64 {
        let id = format!("op-{n}");
        match policy.plan_admission(&active) {
            Admission::Admit => {}
            Admission::EvictThenAdmit(ids) => {
                active.retain(|entry| !ids.contains(&entry.id));
            }
            Admission::Reject => panic!("all-pending queue must always admit"),
        }
        active.push(QueueEntry::new(id, OpStatus::Pending, n));
        assert!(active.len() <= policy.max_depth);
    }

    // Survivors are the newest operations.
    let ids: Vec<&str> = active.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["op-45", "op-46", "op-47", "op-48", "op-49"]);
}

#[test]
fn full_queue_of_syncing_operations_rejects_new_work() {
    let policy = QueuePolicy { max_depth: 2 };
    let active = vec![
        QueueEntry::new("a", OpStatus::Syncing, 1),
        QueueEntry::new("b", OpStatus::Syncing, 2),
    ];
    assert_eq!(policy.plan_admission(&active), Admission::Reject);
}

#[test]
fn status_counts_in_flight() {
    let status = QueueStatus::from_counts(
        &[(OpStatus::Pending, 4), (OpStatus::Syncing, 1)],
        Some(7),
        false,
    );
    assert_eq!(status.in_flight(), 5);
    assert_eq!(status.oldest_pending_at, Some(7));
}

// ============================================================================
// Conflicts
// ============================================================================

#[test]
fn conflict_carries_both_sides_and_resolves_once() {
    let offline = json!({"phone": "123", "email": "a@b.com", "user_id": "user-1"});
    let server = json!({"id": "L-42", "phone": "123", "email": "a@b.com"});

    let mut conflict = ConflictRecord::new(
        "conf-1",
        EntityKind::Lead,
        OperationKind::Create,
        offline.clone(),
        server.clone(),
        1_000,
        7 * 24 * 60 * 60 * 1000,
    );

    assert_eq!(conflict.status, ConflictStatus::PendingResolution);
    assert_eq!(conflict.offline_data, offline);
    assert_eq!(conflict.server_data, server);
    assert!(conflict.belongs_to("user-1"));

    conflict
        .resolve(Resolution::UseOffline, "manager-1", 2_000)
        .unwrap();
    assert!(conflict
        .resolve(Resolution::UseServer, "manager-2", 3_000)
        .is_err());
    assert_eq!(conflict.resolution, Some(Resolution::UseOffline));
}

// ============================================================================
// Autosave
// ============================================================================

#[test]
fn sequential_autosaves_yield_versions_one_through_n() {
    let ttl = 24 * 60 * 60 * 1000;
    let mut snapshot = AutosaveSnapshot::new(
        "snap-1",
        EntityKind::Lead,
        "L-1",
        "user-1",
        json!({"draft": 1}),
        0,
        ttl,
    );

    for n in 2..=8u32 {
        snapshot.refresh(json!({ "draft": n }), i64::from(n), ttl);
    }

    assert_eq!(snapshot.version, 8);
    assert_eq!(snapshot.data, json!({"draft": 8}));
    assert_eq!(snapshot.expires_at, 8 + ttl);
}

// ============================================================================
// Enqueue Validation
// ============================================================================

#[test]
fn malformed_payloads_fail_before_anything_is_queued() {
    let schemas = SchemaSet::crm_default();

    // Valid payloads for several entity kinds.
    assert!(schemas
        .validate(
            EntityKind::FollowUp,
            OperationKind::Create,
            &json!({"lead_id": "L-1", "due_at": 1_706_745_600_000i64}),
        )
        .is_ok());
    assert!(schemas
        .validate(
            EntityKind::VoiceRemark,
            OperationKind::Create,
            &json!({"lead_id": "L-1", "audio_url": "s3://remarks/v1.wav"}),
        )
        .is_ok());

    // Missing natural-key field.
    assert!(schemas
        .validate(
            EntityKind::Lead,
            OperationKind::Create,
            &json!({"email": "a@x.com"}),
        )
        .is_err());

    // Pair that no handler serves.
    assert!(schemas
        .validate(EntityKind::Target, OperationKind::AddRemark, &json!({}))
        .is_err());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Whatever mix of pending/syncing entries a user holds, the planner
    /// never lets the occupied count exceed the cap unless nothing is
    /// evictable, and it only ever evicts pending entries.
    #[test]
    fn admission_planning_preserves_depth_invariant(
        statuses in prop::collection::vec(prop::bool::ANY, 0..40),
        max_depth in 1usize..20,
    ) {
        let policy = QueuePolicy { max_depth };
        let active: Vec<QueueEntry> = statuses
            .iter()
            .enumerate()
            .map(|(n, &is_syncing)| {
                let status = if is_syncing { OpStatus::Syncing } else { OpStatus::Pending };
                QueueEntry::new(format!("op-{n}"), status, n as i64)
            })
            .collect();

        match policy.plan_admission(&active) {
            Admission::Admit => {
                prop_assert!(active.len() < max_depth);
            }
            Admission::EvictThenAdmit(ids) => {
                prop_assert!(active.len() >= max_depth);
                // Exactly enough evictions to fit the newcomer.
                prop_assert_eq!(ids.len(), active.len() + 1 - max_depth);
                for id in &ids {
                    let entry = active.iter().find(|e| &e.id == id).unwrap();
                    prop_assert_eq!(entry.status, OpStatus::Pending);
                }
            }
            Admission::Reject => {
                let pending = active.iter().filter(|e| e.status == OpStatus::Pending).count();
                prop_assert!(pending < active.len() + 1 - max_depth);
            }
        }
    }

    /// Evicted entries are always the oldest pending ones.
    #[test]
    fn eviction_is_oldest_first(extra in 1usize..10, max_depth in 1usize..10) {
        let policy = QueuePolicy { max_depth };
        let total = max_depth + extra - 1;
        let active: Vec<QueueEntry> = (0..=total)
            .map(|n| QueueEntry::new(format!("op-{n:03}"), OpStatus::Pending, n as i64))
            .collect();

        if let Admission::EvictThenAdmit(ids) = policy.plan_admission(&active) {
            let expected: Vec<String> =
                (0..ids.len()).map(|n| format!("op-{n:03}")).collect();
            prop_assert_eq!(ids, expected);
        } else {
            prop_assert!(active.len() < max_depth);
        }
    }
}
