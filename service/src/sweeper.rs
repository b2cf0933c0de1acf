//! Retention sweeper: purges terminal and expired records.
//!
//! Runs on its own cadence, independent of the synchronizer; a sweep
//! failure is logged and never touches the sync loop. Every delete is a
//! plain `DELETE ... WHERE` bounded by a cutoff, so running a sweep twice
//! in a row removes nothing extra the second time.

use crate::config::SyncConfig;
use crate::db::{self, Pool};
use crate::error::Result;
use crate::time::now_ms;
use crate::worker::WorkerHandle;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// What one sweep removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Completed operations past the retention window
    pub completed_operations: u64,
    /// Expired conflicts, resolved or not
    pub expired_conflicts: u64,
    /// Of those, conflicts dropped while still unresolved (no disposition
    /// is recorded for them)
    pub unresolved_conflicts_dropped: u64,
    /// Autosave snapshots past their TTL
    pub expired_autosaves: u64,
}

impl SweepReport {
    /// Total rows removed.
    pub fn total(&self) -> u64 {
        self.completed_operations + self.expired_conflicts + self.expired_autosaves
    }
}

/// Periodic cleanup of the three sync stores.
pub struct RetentionSweeper {
    pool: Pool,
    config: Arc<SyncConfig>,
}

impl RetentionSweeper {
    pub(crate) fn new(pool: Pool, config: Arc<SyncConfig>) -> Self {
        Self { pool, config }
    }

    /// Remove completed operations past the retention window, expired
    /// conflicts regardless of resolution status, and expired autosaves.
    /// May be called on demand as well as from the periodic loop.
    pub async fn cleanup_old_records(&self) -> Result<SweepReport> {
        let now = now_ms();
        let cutoff = now - self.config.completed_retention_ms();

        let completed_operations =
            db::operations::delete_completed_before(&self.pool, cutoff).await?;
        let (unresolved, resolved) = db::conflicts::delete_expired(&self.pool, now).await?;
        let expired_autosaves = db::autosaves::delete_expired(&self.pool, now).await?;

        let report = SweepReport {
            completed_operations,
            expired_conflicts: unresolved + resolved,
            unresolved_conflicts_dropped: unresolved,
            expired_autosaves,
        };

        if report.total() > 0 {
            tracing::info!(
                completed_operations = report.completed_operations,
                expired_conflicts = report.expired_conflicts,
                unresolved_conflicts_dropped = report.unresolved_conflicts_dropped,
                expired_autosaves = report.expired_autosaves,
                "retention sweep removed records"
            );
        } else {
            tracing::debug!("retention sweep found nothing to remove");
        }

        Ok(report)
    }

    /// Spawn the periodic sweep loop.
    pub fn start(self) -> WorkerHandle {
        let (shutdown, mut signal) = watch::channel(false);

        let join = tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.config.sweep_interval.as_secs(),
                "retention sweeper started"
            );

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.sweep_interval) => {}
                    changed = signal.changed() => {
                        // A dropped handle counts as a stop signal.
                        if changed.is_err() || *signal.borrow() {
                            break;
                        }
                    }
                }

                if let Err(error) = self.cleanup_old_records().await {
                    tracing::error!(%error, "retention sweep failed");
                }
            }

            tracing::info!("retention sweeper stopped");
        });

        WorkerHandle::new(shutdown, join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_totals_do_not_double_count_unresolved() {
        let report = SweepReport {
            completed_operations: 5,
            expired_conflicts: 3,
            unresolved_conflicts_dropped: 2,
            expired_autosaves: 4,
        };
        // unresolved_conflicts_dropped is a subset of expired_conflicts.
        assert_eq!(report.total(), 12);
    }

    #[test]
    fn empty_report_totals_zero() {
        assert_eq!(SweepReport::default().total(), 0);
    }

    #[test]
    fn report_serialization_format() {
        let report = SweepReport {
            completed_operations: 1,
            ..SweepReport::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("completedOperations"));
        assert!(json.contains("unresolvedConflictsDropped"));
    }
}
