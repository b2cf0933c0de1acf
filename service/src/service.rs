//! The in-process sync service facade.
//!
//! One [`SyncService`] is constructed at startup with injected store
//! handles, a handler registry, and a notification sink, then passed by
//! reference to the surrounding CRUD layer. There is no ambient global
//! state; the background synchronizer and sweeper are spawned from the same
//! instance so they share its configuration and single-flight guard.

use crate::config::SyncConfig;
use crate::db::{self, Pool};
use crate::error::{Result, SyncError};
use crate::handler::HandlerRegistry;
use crate::notify::{user_topic, Notification, NotificationSink, QueueEvent};
use crate::sweeper::RetentionSweeper;
use crate::time::now_ms;
use crate::worker::Synchronizer;
use courier_engine::{
    Admission, AutosaveSnapshot, ConflictRecord, EntityKind, Error as EngineError, OperationId,
    OperationKind, QueueStatus, QueuedOperation, Resolution, SchemaSet,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Offline operation synchronization service.
pub struct SyncService {
    pool: Pool,
    config: Arc<SyncConfig>,
    registry: Arc<HandlerRegistry>,
    sink: Arc<dyn NotificationSink>,
    schemas: SchemaSet,
    pass_running: Arc<AtomicBool>,
}

impl SyncService {
    /// Create a service over an existing pool.
    pub fn new(
        pool: Pool,
        config: SyncConfig,
        registry: Arc<HandlerRegistry>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            registry,
            sink,
            schemas: SchemaSet::crm_default(),
            pass_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build the background synchronizer for this service.
    ///
    /// The synchronizer shares the service's single-flight guard, so
    /// `queue_status` reports `is_syncing` truthfully.
    pub fn synchronizer(&self) -> Synchronizer {
        Synchronizer::new(
            self.pool.clone(),
            self.config.clone(),
            self.registry.clone(),
            self.sink.clone(),
            self.pass_running.clone(),
        )
    }

    /// Build the retention sweeper for this service.
    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.pool.clone(), self.config.clone())
    }

    /// Queue an offline mutation for replay.
    ///
    /// Validates the (entity, operation) pair against the handler registry
    /// and the payload against its schema before touching the store. If the
    /// user's queue is at capacity, the oldest pending operations are
    /// evicted to make room; operations mid-sync are never evicted.
    pub async fn enqueue(
        &self,
        payload: serde_json::Value,
        user_id: &str,
        entity: EntityKind,
        operation: OperationKind,
    ) -> Result<OperationId> {
        if !self.registry.is_registered(entity, operation) {
            return Err(EngineError::UnsupportedOperation {
                entity: entity.to_string(),
                operation: operation.to_string(),
            }
            .into());
        }
        self.schemas.validate(entity, operation, &payload)?;

        let active = db::operations::active_entries(&self.pool, user_id).await?;
        match self.config.queue_policy().plan_admission(&active) {
            Admission::Admit => {}
            Admission::EvictThenAdmit(ids) => {
                let evicted = db::operations::delete_pending(&self.pool, &ids).await?;
                tracing::warn!(
                    user_id,
                    evicted,
                    "queue at capacity, evicted oldest pending operations"
                );
            }
            Admission::Reject => {
                return Err(SyncError::Capacity {
                    user_id: user_id.to_string(),
                    depth: active.len(),
                });
            }
        }

        let op = QueuedOperation::new(
            Uuid::new_v4().to_string(),
            user_id,
            entity,
            operation,
            payload,
            now_ms(),
        );
        db::operations::insert_operation(&self.pool, &op).await?;

        tracing::debug!(id = %op.id, user_id, entity = %entity, operation = %operation, "operation enqueued");
        self.sink.publish(
            &user_topic(user_id),
            &Notification {
                user_id: user_id.to_string(),
                operation_id: op.id.clone(),
                event: QueueEvent::Queued,
            },
        );

        Ok(op.id)
    }

    /// Read-only aggregate of a user's queue.
    pub async fn queue_status(&self, user_id: &str) -> Result<QueueStatus> {
        let counts = db::operations::status_counts(&self.pool, user_id).await?;
        let oldest_pending_at = db::operations::oldest_pending_at(&self.pool, user_id).await?;

        Ok(QueueStatus::from_counts(
            &counts,
            oldest_pending_at,
            self.pass_running.load(Ordering::SeqCst),
        ))
    }

    /// Unresolved conflicts, newest first.
    ///
    /// With a `user_id`, ownership is matched against the payloads within
    /// the newest `limit` unresolved conflicts.
    pub async fn list_conflicts(
        &self,
        user_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ConflictRecord>> {
        let rows = db::conflicts::list_pending(&self.pool, i64::from(limit)).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(row.to_record()?);
        }
        if let Some(user_id) = user_id {
            records.retain(|record| record.belongs_to(user_id));
        }

        Ok(records)
    }

    /// Record a manual conflict resolution.
    ///
    /// The resolution is an audit record only: even `UseOffline` does not
    /// re-enqueue or re-apply the offline payload. Returns false for unknown
    /// or already-resolved conflicts.
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        resolution: Resolution,
        resolved_by: &str,
    ) -> Result<bool> {
        let resolved =
            db::conflicts::resolve(&self.pool, conflict_id, resolution, resolved_by, now_ms())
                .await?;

        if resolved {
            tracing::info!(
                conflict_id,
                resolution = %resolution,
                resolved_by,
                "conflict resolved; offline payload not re-applied"
            );
        }

        Ok(resolved)
    }

    /// Upsert a draft snapshot for (entity, entity_id, user).
    ///
    /// The first write creates version 1; every later write bumps the
    /// version, replaces the data, and refreshes the 24h TTL. Returns the
    /// snapshot id.
    pub async fn autosave(
        &self,
        data: serde_json::Value,
        entity: EntityKind,
        entity_id: &str,
        user_id: &str,
    ) -> Result<String> {
        let now = now_ms();
        let candidate = AutosaveSnapshot::new(
            Uuid::new_v4().to_string(),
            entity,
            entity_id,
            user_id,
            data,
            now,
            self.config.autosave_ttl_ms(),
        );

        let (id, version) = db::autosaves::upsert(&self.pool, &candidate).await?;
        tracing::debug!(entity = %entity, entity_id, user_id, version, "draft autosaved");

        Ok(id)
    }

    /// Fetch the live draft snapshot for a scope, if one exists.
    pub async fn get_autosaved(
        &self,
        entity: EntityKind,
        entity_id: &str,
        user_id: &str,
    ) -> Result<Option<AutosaveSnapshot>> {
        match db::autosaves::get_live(&self.pool, entity, entity_id, user_id, now_ms()).await? {
            Some(row) => Ok(Some(row.to_snapshot()?)),
            None => Ok(None),
        }
    }
}
