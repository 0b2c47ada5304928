//! Pin edit history.
//!
//! Every edit stores the version it replaced. Versions are numbered per pin
//! starting at 1.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::flags::PinFlags;
use super::pin::{Pin, PinType};
use crate::db::DbPool;
use crate::{CorkboardError, Result};

/// A replaced version of a pin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinVersion {
    pub pin_id: Uuid,
    pub history_id: i64,
    pub pin_type: PinType,
    pub content: String,
    pub flags: PinFlags,
    pub attachment_paths: Vec<String>,
    pub metadata: Value,
    /// When this version was written.
    pub edited: DateTime<Utc>,
    /// Who replaced it, and when.
    pub replaced_by: String,
    pub replaced_at: DateTime<Utc>,
}

/// One line of a pin's history listing.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PinVersionSummary {
    pub history_id: i64,
    pub edited: DateTime<Utc>,
    pub replaced_by: String,
    pub replaced_at: DateTime<Utc>,
}

pub struct HistoryRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> HistoryRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Versions of a pin, newest first.
    pub async fn preview(&self, pin_id: Uuid) -> Result<Vec<PinVersionSummary>> {
        let rows = sqlx::query_as(
            "SELECT history_id, edited, replaced_by, replaced_at FROM pin_history
             WHERE pin_id = ? ORDER BY history_id DESC",
        )
        .bind(pin_id.to_string())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, pin_id: Uuid, history_id: i64) -> Result<Option<PinVersion>> {
        let row: Option<VersionRow> = sqlx::query_as(
            "SELECT history_id, pin_type, content, flags, attachment_paths, metadata,
                    edited, replaced_by, replaced_at
             FROM pin_history WHERE pin_id = ? AND history_id = ?",
        )
        .bind(pin_id.to_string())
        .bind(history_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|row| row.into_version(pin_id)).transpose()
    }

    /// Store `previous` as the newest version of its pin. Returns its number.
    pub async fn record(
        conn: &mut SqliteConnection,
        previous: &Pin,
        replaced_by: &str,
        replaced_at: DateTime<Utc>,
    ) -> Result<i64> {
        let attachment_paths = serde_json::to_string(&previous.attachment_paths)
            .map_err(|e| CorkboardError::InvalidInput(e.to_string()))?;

        let history_id: i64 = sqlx::query_scalar(
            "INSERT INTO pin_history (pin_id, history_id, pin_type, content, flags,
                                      attachment_paths, metadata, edited, replaced_by, replaced_at)
             SELECT ?1, COALESCE(MAX(history_id), 0) + 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
             FROM pin_history WHERE pin_id = ?1
             RETURNING history_id",
        )
        .bind(previous.id.to_string())
        .bind(previous.pin_type.as_i64())
        .bind(&previous.content)
        .bind(previous.flags.bits() as i64)
        .bind(attachment_paths)
        .bind(previous.metadata.to_string())
        .bind(previous.edited)
        .bind(replaced_by)
        .bind(replaced_at)
        .fetch_one(&mut *conn)
        .await?;
        Ok(history_id)
    }
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    history_id: i64,
    pin_type: i64,
    content: String,
    flags: i64,
    attachment_paths: String,
    metadata: String,
    edited: DateTime<Utc>,
    replaced_by: String,
    replaced_at: DateTime<Utc>,
}

impl VersionRow {
    fn into_version(self, pin_id: Uuid) -> Result<PinVersion> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            CorkboardError::Database(format!(
                "corrupt history {pin_id}/{}: {what}: {e}",
                self.history_id
            ))
        };

        let pin_type = PinType::try_from(self.pin_type).map_err(|e| corrupt("pin_type", &e))?;
        let flags = u64::try_from(self.flags)
            .map_err(|e| corrupt("flags", &e))
            .and_then(|bits| PinFlags::from_bits(bits).map_err(|e| corrupt("flags", &e)))?;
        let attachment_paths = serde_json::from_str(&self.attachment_paths)
            .map_err(|e| corrupt("attachment_paths", &e))?;
        let metadata = serde_json::from_str(&self.metadata).map_err(|e| corrupt("metadata", &e))?;

        Ok(PinVersion {
            pin_id,
            history_id: self.history_id,
            pin_type,
            content: self.content,
            flags,
            attachment_paths,
            metadata,
            edited: self.edited,
            replaced_by: self.replaced_by,
            replaced_at: self.replaced_at,
        })
    }
}
