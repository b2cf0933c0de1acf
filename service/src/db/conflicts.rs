//! Database operations for the sync_conflicts table.

use crate::error::Result;
use courier_engine::{ConflictRecord, Resolution, Timestamp};
use sqlx::{PgPool, Row};

/// A stored conflict row from the database.
#[derive(Debug)]
pub struct StoredConflict {
    pub id: String,
    pub entity_type: String,
    pub operation_type: String,
    pub offline_data: serde_json::Value,
    pub server_data: serde_json::Value,
    pub status: String,
    pub resolution: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<i64>,
    pub created_at: i64,
    pub expires_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredConflict {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(StoredConflict {
            id: row.try_get("id")?,
            entity_type: row.try_get("entity_type")?,
            operation_type: row.try_get("operation_type")?,
            offline_data: row.try_get("offline_data")?,
            server_data: row.try_get("server_data")?,
            status: row.try_get("status")?,
            resolution: row.try_get("resolution")?,
            resolved_by: row.try_get("resolved_by")?,
            resolved_at: row.try_get("resolved_at")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl StoredConflict {
    /// Convert a database row to an engine conflict record.
    pub fn to_record(&self) -> Result<ConflictRecord> {
        Ok(ConflictRecord {
            id: self.id.clone(),
            entity: self.entity_type.parse()?,
            operation: self.operation_type.parse()?,
            offline_data: self.offline_data.clone(),
            server_data: self.server_data.clone(),
            status: self.status.parse()?,
            resolution: self
                .resolution
                .as_deref()
                .map(|r| r.parse::<Resolution>())
                .transpose()?,
            resolved_by: self.resolved_by.clone(),
            resolved_at: self.resolved_at,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

/// File a freshly detected conflict.
pub async fn insert_conflict(pool: &PgPool, conflict: &ConflictRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_conflicts (
            id, entity_type, operation_type, offline_data, server_data,
            status, resolution, resolved_by, resolved_at, created_at, expires_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&conflict.id)
    .bind(conflict.entity.as_str())
    .bind(conflict.operation.as_str())
    .bind(&conflict.offline_data)
    .bind(&conflict.server_data)
    .bind(conflict.status.as_str())
    .bind(conflict.resolution.map(|r| r.as_str()))
    .bind(&conflict.resolved_by)
    .bind(conflict.resolved_at)
    .bind(conflict.created_at)
    .bind(conflict.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Unresolved conflicts, newest first.
pub async fn list_pending(pool: &PgPool, limit: i64) -> Result<Vec<StoredConflict>> {
    let rows = sqlx::query_as::<_, StoredConflict>(
        r#"
        SELECT id, entity_type, operation_type, offline_data, server_data,
               status, resolution, resolved_by, resolved_at, created_at, expires_at
        FROM sync_conflicts
        WHERE status = 'pending_resolution'
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Record a manual resolution. Returns false for unknown or
/// already-resolved conflicts.
pub async fn resolve(
    pool: &PgPool,
    id: &str,
    resolution: Resolution,
    resolved_by: &str,
    now: Timestamp,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sync_conflicts
        SET status = 'resolved', resolution = $2, resolved_by = $3, resolved_at = $4
        WHERE id = $1 AND status = 'pending_resolution'
        "#,
    )
    .bind(id)
    .bind(resolution.as_str())
    .bind(resolved_by)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete expired conflicts regardless of resolution status.
///
/// Returns (unresolved, resolved) deletion counts; unresolved drops are
/// reported separately because no disposition is ever recorded for them.
pub async fn delete_expired(pool: &PgPool, now: Timestamp) -> Result<(u64, u64)> {
    let unresolved = sqlx::query(
        r#"
        DELETE FROM sync_conflicts
        WHERE expires_at <= $1 AND status = 'pending_resolution'
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    let resolved = sqlx::query(
        r#"
        DELETE FROM sync_conflicts
        WHERE expires_at <= $1
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    Ok((unresolved, resolved))
}
