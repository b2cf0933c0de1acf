//! Background synchronizer: drains pending operations in bounded batches.
//!
//! One synchronizer runs per process. Each pass claims up to `batch_size`
//! due operations (oldest first), dispatches them sequentially to their
//! entity handlers, and persists each outcome with a conditional update.
//! One operation's failure never aborts the batch; a pass-level failure
//! (store unavailable) stretches the sleep before the next attempt. The
//! loop exits only on its shutdown signal.

use crate::config::SyncConfig;
use crate::db::{self, Pool};
use crate::error::Result;
use crate::handler::{ApplyOutcome, HandlerError, HandlerRegistry};
use crate::notify::{user_topic, Notification, NotificationSink, QueueEvent};
use crate::time::now_ms;
use courier_engine::{ConflictRecord, OpStatus, QueuedOperation, RetryDisposition};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Handle to a running background loop.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub(crate) fn new(shutdown: watch::Sender<bool>, join: JoinHandle<()>) -> Self {
        Self { shutdown, join }
    }

    /// Signal the loop to stop and wait for it to exit. A pass already in
    /// flight finishes first; per-operation updates are atomic, so nothing
    /// needs rolling back.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Counters for one synchronizer pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// Operations claimed and driven to an outcome
    pub processed: usize,
    pub completed: usize,
    pub conflicts: usize,
    /// Requeued after a transient handler failure
    pub retried: usize,
    /// Terminally failed (retries exhausted)
    pub failed: usize,
    /// Selected but left for a later pass (lost claim, store error)
    pub skipped: usize,
}

/// The background synchronization worker.
pub struct Synchronizer {
    pool: Pool,
    config: Arc<SyncConfig>,
    registry: Arc<HandlerRegistry>,
    sink: Arc<dyn NotificationSink>,
    pass_running: Arc<AtomicBool>,
}

impl Synchronizer {
    pub(crate) fn new(
        pool: Pool,
        config: Arc<SyncConfig>,
        registry: Arc<HandlerRegistry>,
        sink: Arc<dyn NotificationSink>,
        pass_running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pool,
            config,
            registry,
            sink,
            pass_running,
        }
    }

    /// Spawn the periodic sync loop.
    pub fn start(self) -> WorkerHandle {
        let (shutdown, mut signal) = watch::channel(false);

        let join = tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.config.sync_interval.as_secs(),
                batch_size = self.config.batch_size,
                "synchronizer started"
            );

            let mut failure_streak = 0u32;
            loop {
                let sleep = stretched_interval(self.config.sync_interval, failure_streak);
                tokio::select! {
                    _ = tokio::time::sleep(sleep) => {}
                    changed = signal.changed() => {
                        // A dropped handle counts as a stop signal.
                        if changed.is_err() || *signal.borrow() {
                            break;
                        }
                    }
                }

                match self.run_pass().await {
                    Ok(Some(summary)) => {
                        failure_streak = 0;
                        if summary.processed > 0 || summary.skipped > 0 {
                            tracing::info!(
                                processed = summary.processed,
                                completed = summary.completed,
                                conflicts = summary.conflicts,
                                retried = summary.retried,
                                failed = summary.failed,
                                skipped = summary.skipped,
                                "sync pass finished"
                            );
                        }
                    }
                    Ok(None) => {
                        // Previous pass still in flight; nothing to do.
                    }
                    Err(error) => {
                        failure_streak += 1;
                        tracing::error!(%error, failure_streak, "sync pass failed");
                    }
                }
            }

            tracing::info!("synchronizer stopped");
        });

        WorkerHandle::new(shutdown, join)
    }

    /// Run one pass now. Returns `None` if another pass holds the
    /// single-flight guard.
    pub async fn run_pass(&self) -> Result<Option<PassSummary>> {
        if self
            .pass_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("sync pass already running, skipping");
            return Ok(None);
        }

        let outcome = self.drain_batch().await;
        self.pass_running.store(false, Ordering::SeqCst);
        outcome.map(Some)
    }

    async fn drain_batch(&self) -> Result<PassSummary> {
        let rows =
            db::operations::fetch_due(&self.pool, i64::from(self.config.batch_size), now_ms())
                .await?;

        let mut summary = PassSummary::default();
        for row in rows {
            let id = row.id.clone();
            let op = match row.to_operation() {
                Ok(op) => op,
                Err(error) => {
                    tracing::warn!(id = %id, %error, "skipping undecodable operation row");
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.sync_one(op).await {
                Ok(Some(status)) => {
                    summary.processed += 1;
                    match status {
                        OpStatus::Completed => summary.completed += 1,
                        OpStatus::Conflict => summary.conflicts += 1,
                        OpStatus::Pending => summary.retried += 1,
                        OpStatus::Failed => summary.failed += 1,
                        OpStatus::Syncing => {}
                    }
                }
                Ok(None) => summary.skipped += 1,
                Err(error) => {
                    // Store trouble for one operation must not abort the
                    // batch; the row stays claimed or pending and a later
                    // pass picks it up.
                    summary.skipped += 1;
                    tracing::warn!(id = %id, %error, "operation left for a later pass");
                }
            }
        }

        Ok(summary)
    }

    /// Claim and replay one operation. Returns `None` if the claim was lost
    /// to a concurrent eviction.
    async fn sync_one(&self, mut op: QueuedOperation) -> Result<Option<OpStatus>> {
        let claimed_at = now_ms();
        if !db::operations::claim(&self.pool, &op.id, claimed_at).await? {
            return Ok(None);
        }
        op.begin_sync(claimed_at)?;

        let dispatched = match self.registry.get(op.entity, op.operation) {
            Some(handler) => handler.apply(&op.payload).await,
            // The pair was registered at enqueue time; a registry that has
            // since changed is treated as a transient condition.
            None => Err(HandlerError::new(format!(
                "no handler registered for {}.{}",
                op.entity, op.operation
            ))),
        };

        let now = now_ms();
        let mut event = None;
        match dispatched {
            Ok(ApplyOutcome::Applied { summary }) => {
                op.complete(Some(summary), now)?;
                event = Some(QueueEvent::Completed);
            }
            Ok(ApplyOutcome::Conflict { server_data }) => {
                let conflict = ConflictRecord::new(
                    Uuid::new_v4().to_string(),
                    op.entity,
                    op.operation,
                    op.payload.clone(),
                    server_data,
                    now,
                    self.config.conflict_ttl_ms(),
                );
                db::conflicts::insert_conflict(&self.pool, &conflict).await?;
                op.mark_conflict(now)?;
                event = Some(QueueEvent::Conflict);
                tracing::info!(
                    id = %op.id,
                    conflict_id = %conflict.id,
                    entity = %op.entity,
                    "collision detected, parked for manual resolution"
                );
            }
            Err(error) => {
                match op.record_failure(&error.to_string(), now, &self.config.retry_policy())? {
                    RetryDisposition::Retry { next_retry_at } => {
                        tracing::warn!(
                            id = %op.id,
                            retry_count = op.retry_count,
                            next_retry_at,
                            %error,
                            "handler failed, operation requeued"
                        );
                    }
                    RetryDisposition::Exhausted => {
                        event = Some(QueueEvent::Failed);
                        tracing::warn!(id = %op.id, %error, "retries exhausted, operation failed");
                    }
                }
            }
        }

        db::operations::persist_outcome(&self.pool, &op).await?;

        if let Some(event) = event {
            self.sink.publish(
                &user_topic(&op.user_id),
                &Notification {
                    user_id: op.user_id.clone(),
                    operation_id: op.id.clone(),
                    event,
                },
            );
        }

        Ok(Some(op.status))
    }
}

/// Sleep between passes, stretched while consecutive passes fail so a down
/// store is not hammered every interval. Capped at 8x the base interval.
fn stretched_interval(base: Duration, failure_streak: u32) -> Duration {
    base.saturating_mul(1 << failure_streak.min(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_stretches_and_caps() {
        let base = Duration::from_secs(5);

        assert_eq!(stretched_interval(base, 0), Duration::from_secs(5));
        assert_eq!(stretched_interval(base, 1), Duration::from_secs(10));
        assert_eq!(stretched_interval(base, 2), Duration::from_secs(20));
        assert_eq!(stretched_interval(base, 3), Duration::from_secs(40));
        // Streaks beyond the cap stop growing.
        assert_eq!(stretched_interval(base, 10), Duration::from_secs(40));
    }

    #[test]
    fn pass_summary_starts_empty() {
        let summary = PassSummary::default();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 0);
    }
}
