//! Database operations for the sync_operations table.
//!
//! Every mutation here is a single conditional statement keyed by operation
//! id, so concurrent passes and evictions can only race benignly: whoever
//! loses the conditional update simply affects zero rows.

use crate::error::Result;
use courier_engine::{OpStatus, QueueEntry, QueuedOperation, Timestamp};
use sqlx::{PgPool, Row};

/// A stored operation row from the database.
#[derive(Debug)]
pub struct StoredOperation {
    pub id: String,
    pub user_id: String,
    pub entity_type: String,
    pub operation_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub retry_count: i32,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub sync_started_at: Option<i64>,
    pub sync_completed_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub next_retry_at: Option<i64>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredOperation {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(StoredOperation {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            entity_type: row.try_get("entity_type")?,
            operation_type: row.try_get("operation_type")?,
            payload: row.try_get("payload")?,
            status: row.try_get("status")?,
            retry_count: row.try_get("retry_count")?,
            result: row.try_get("result")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            sync_started_at: row.try_get("sync_started_at")?,
            sync_completed_at: row.try_get("sync_completed_at")?,
            failed_at: row.try_get("failed_at")?,
            next_retry_at: row.try_get("next_retry_at")?,
        })
    }
}

impl StoredOperation {
    /// Convert a database row to an engine operation.
    pub fn to_operation(&self) -> Result<QueuedOperation> {
        Ok(QueuedOperation {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            entity: self.entity_type.parse()?,
            operation: self.operation_type.parse()?,
            payload: self.payload.clone(),
            status: self.status.parse()?,
            retry_count: self.retry_count as u32,
            result: self.result.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            sync_started_at: self.sync_started_at,
            sync_completed_at: self.sync_completed_at,
            failed_at: self.failed_at,
            next_retry_at: self.next_retry_at,
        })
    }
}

/// Insert a freshly enqueued operation.
pub async fn insert_operation(pool: &PgPool, op: &QueuedOperation) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_operations (
            id, user_id, entity_type, operation_type, payload, status,
            retry_count, result, error_message, created_at,
            sync_started_at, sync_completed_at, failed_at, next_retry_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(&op.id)
    .bind(&op.user_id)
    .bind(op.entity.as_str())
    .bind(op.operation.as_str())
    .bind(&op.payload)
    .bind(op.status.as_str())
    .bind(op.retry_count as i32)
    .bind(&op.result)
    .bind(&op.error_message)
    .bind(op.created_at)
    .bind(op.sync_started_at)
    .bind(op.sync_completed_at)
    .bind(op.failed_at)
    .bind(op.next_retry_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Select up to `limit` pending operations due at `now`, oldest first.
pub async fn fetch_due(
    pool: &PgPool,
    limit: i64,
    now: Timestamp,
) -> Result<Vec<StoredOperation>> {
    let rows = sqlx::query_as::<_, StoredOperation>(
        r#"
        SELECT id, user_id, entity_type, operation_type, payload, status,
               retry_count, result, error_message, created_at,
               sync_started_at, sync_completed_at, failed_at, next_retry_at
        FROM sync_operations
        WHERE status = 'pending'
          AND (next_retry_at IS NULL OR next_retry_at <= $2)
        ORDER BY created_at ASC, id ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Claim a pending operation for the current pass (`pending -> syncing`).
///
/// Returns false if the row was already claimed or evicted.
pub async fn claim(pool: &PgPool, id: &str, now: Timestamp) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sync_operations
        SET status = 'syncing', sync_started_at = $2
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Persist the outcome of a claimed operation.
///
/// Conditional on the row still being `syncing`, so exactly one outcome ever
/// lands per claim. Returns false if the condition failed.
pub async fn persist_outcome(pool: &PgPool, op: &QueuedOperation) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sync_operations
        SET status = $2, retry_count = $3, result = $4, error_message = $5,
            sync_completed_at = $6, failed_at = $7, next_retry_at = $8
        WHERE id = $1 AND status = 'syncing'
        "#,
    )
    .bind(&op.id)
    .bind(op.status.as_str())
    .bind(op.retry_count as i32)
    .bind(&op.result)
    .bind(&op.error_message)
    .bind(op.sync_completed_at)
    .bind(op.failed_at)
    .bind(op.next_retry_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// A user's in-flight (pending + syncing) rows, for admission planning.
pub async fn active_entries(pool: &PgPool, user_id: &str) -> Result<Vec<QueueEntry>> {
    let rows = sqlx::query_as::<_, (String, String, i64)>(
        r#"
        SELECT id, status, created_at
        FROM sync_operations
        WHERE user_id = $1 AND status IN ('pending', 'syncing')
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id, status, created_at)| {
            Ok(QueueEntry::new(id, status.parse::<OpStatus>()?, created_at))
        })
        .collect()
}

/// Evict planned operations, touching only rows still pending.
///
/// Returns the number of rows actually removed.
pub async fn delete_pending(pool: &PgPool, ids: &[String]) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM sync_operations
        WHERE id = ANY($1) AND status = 'pending'
        "#,
    )
    .bind(ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Per-status operation counts for one user.
pub async fn status_counts(pool: &PgPool, user_id: &str) -> Result<Vec<(OpStatus, u64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status, COUNT(*)
        FROM sync_operations
        WHERE user_id = $1
        GROUP BY status
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(status, count)| Ok((status.parse::<OpStatus>()?, count as u64)))
        .collect()
}

/// Enqueue time of the user's oldest pending operation.
pub async fn oldest_pending_at(pool: &PgPool, user_id: &str) -> Result<Option<Timestamp>> {
    let oldest: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT MIN(created_at)
        FROM sync_operations
        WHERE user_id = $1 AND status = 'pending'
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(oldest)
}

/// Delete completed operations that finished before `cutoff`.
pub async fn delete_completed_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM sync_operations
        WHERE status = 'completed' AND sync_completed_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
