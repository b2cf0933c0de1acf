//! Database operations for the autosaves table.
//!
//! The scope-key unique constraint makes the upsert the whole story: first
//! write inserts at version 1, every later write bumps the stored version
//! and refreshes the TTL in one statement.

use crate::error::Result;
use courier_engine::{AutosaveSnapshot, EntityKind, Timestamp};
use sqlx::{PgPool, Row};

/// A stored autosave row from the database.
#[derive(Debug)]
pub struct StoredAutosave {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: String,
    pub data: serde_json::Value,
    pub version: i32,
    pub created_at: i64,
    pub expires_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredAutosave {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(StoredAutosave {
            id: row.try_get("id")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            user_id: row.try_get("user_id")?,
            data: row.try_get("data")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl StoredAutosave {
    /// Convert a database row to an engine snapshot.
    pub fn to_snapshot(&self) -> Result<AutosaveSnapshot> {
        Ok(AutosaveSnapshot {
            id: self.id.clone(),
            entity: self.entity_type.parse()?,
            entity_id: self.entity_id.clone(),
            user_id: self.user_id.clone(),
            data: self.data.clone(),
            version: self.version as u32,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

/// Upsert a draft for its (entity, entity_id, user) scope.
///
/// `candidate` is the version-1 snapshot the caller would insert; if the
/// scope already holds a row, that row keeps its id and created_at, its
/// version is bumped, and its data and expiry are replaced. Returns the
/// surviving row's (id, version).
pub async fn upsert(pool: &PgPool, candidate: &AutosaveSnapshot) -> Result<(String, u32)> {
    let (id, version): (String, i32) = sqlx::query_as(
        r#"
        INSERT INTO autosaves (
            id, entity_type, entity_id, user_id, data, version, created_at, expires_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (entity_type, entity_id, user_id) DO UPDATE SET
            data = EXCLUDED.data,
            version = autosaves.version + 1,
            expires_at = EXCLUDED.expires_at
        RETURNING id, version
        "#,
    )
    .bind(&candidate.id)
    .bind(candidate.entity.as_str())
    .bind(&candidate.entity_id)
    .bind(&candidate.user_id)
    .bind(&candidate.data)
    .bind(candidate.version as i32)
    .bind(candidate.created_at)
    .bind(candidate.expires_at)
    .fetch_one(pool)
    .await?;

    Ok((id, version as u32))
}

/// Fetch the live (unexpired) snapshot for a scope, if any.
pub async fn get_live(
    pool: &PgPool,
    entity: EntityKind,
    entity_id: &str,
    user_id: &str,
    now: Timestamp,
) -> Result<Option<StoredAutosave>> {
    let row = sqlx::query_as::<_, StoredAutosave>(
        r#"
        SELECT id, entity_type, entity_id, user_id, data, version, created_at, expires_at
        FROM autosaves
        WHERE entity_type = $1 AND entity_id = $2 AND user_id = $3
          AND expires_at > $4
        "#,
    )
    .bind(entity.as_str())
    .bind(entity_id)
    .bind(user_id)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Delete snapshots past their TTL.
pub async fn delete_expired(pool: &PgPool, now: Timestamp) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM autosaves
        WHERE expires_at <= $1
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
