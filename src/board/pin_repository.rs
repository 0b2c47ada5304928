//! Pin repository for corkboard.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::flags::PinFlags;
use super::pin::{Pin, PinSort, PinType, ValidatedPinUpdate};
use super::repository::parse_uuid;
use crate::auth::PUBLIC_USER_ID;
use crate::db::{fold_case, like_pattern, DbPool};
use crate::{CorkboardError, Result};

const PIN_COLUMNS: &str = "p.id, p.board_id, p.pin_type, p.content, p.creator_id, p.flags,
     p.attachment_paths, p.metadata, p.created, p.edited";

/// Criteria for [`PinRepository::search`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PinFilter<'f> {
    pub viewer: Option<&'f str>,
    /// Substring of the content, matched case-insensitively.
    pub query: &'f str,
    pub board_id: Option<Uuid>,
    pub creator: Option<&'f str>,
    /// Restrict to this user's favorites.
    pub favorited_by: Option<&'f str>,
    pub sort_by: PinSort,
    pub sort_down: bool,
}

/// Repository for pin storage.
pub struct PinRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PinRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Pin>> {
        let row: Option<PinRow> =
            sqlx::query_as(&format!("SELECT {PIN_COLUMNS} FROM pins p WHERE p.id = ?"))
                .bind(id.to_string())
                .fetch_optional(self.pool)
                .await?;

        row.map(PinRow::into_pin).transpose()
    }

    /// Visible pins matching `filter`, ordered by its sort.
    ///
    /// A pin is visible when its board lists the viewer or the public entry.
    pub async fn search(&self, filter: &PinFilter<'_>, offset: u32, limit: u32) -> Result<Vec<Pin>> {
        let folded = fold_case(filter.query);

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PIN_COLUMNS} FROM pins p"));
        if let Some(user_id) = filter.favorited_by {
            builder.push(" JOIN pin_favorites f ON f.pin_id = p.id AND f.user_id = ");
            builder.push_bind(user_id);
        }

        builder.push(" WHERE p.board_id IN (SELECT board_id FROM board_perms WHERE user_id IN (");
        builder.push_bind(PUBLIC_USER_ID);
        if let Some(viewer) = filter.viewer {
            builder.push(", ");
            builder.push_bind(viewer);
        }
        builder.push(")) AND p.content_folded LIKE ");
        builder.push_bind(like_pattern(&folded));
        builder.push(" ESCAPE '\\'");

        if let Some(board_id) = filter.board_id {
            builder.push(" AND p.board_id = ");
            builder.push_bind(board_id.to_string());
        }
        if let Some(creator) = filter.creator {
            builder.push(" AND p.creator_id = ");
            builder.push_bind(creator);
        }

        let direction = if filter.sort_down { "DESC" } else { "ASC" };
        match filter.sort_by {
            PinSort::Relevance => {
                builder.push(" ORDER BY instr(p.content_folded, ");
                builder.push_bind(folded);
                builder.push("), p.created DESC, p.rowid DESC");
            }
            PinSort::Created => {
                builder.push(format!(" ORDER BY p.created {direction}, p.rowid {direction}"));
            }
            PinSort::Edited => {
                builder.push(format!(" ORDER BY p.edited {direction}, p.rowid {direction}"));
            }
        }

        builder.push(" LIMIT ");
        builder.push_bind(i64::from(limit));
        builder.push(" OFFSET ");
        builder.push_bind(i64::from(offset));

        let rows: Vec<PinRow> = builder.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(PinRow::into_pin).collect()
    }

    pub async fn insert(conn: &mut SqliteConnection, pin: &Pin) -> Result<()> {
        sqlx::query(
            "INSERT INTO pins (id, board_id, pin_type, content, creator_id, flags,
                               attachment_paths, metadata, created, edited, content_folded)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(pin.id.to_string())
        .bind(pin.board_id.to_string())
        .bind(pin.pin_type.as_i64())
        .bind(&pin.content)
        .bind(&pin.creator)
        .bind(flags_to_db(pin.flags))
        .bind(json_text(&pin.attachment_paths)?)
        .bind(pin.metadata.to_string())
        .bind(pin.created)
        .bind(pin.edited)
        .bind(fold_case(&pin.content))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Apply a partial update and bump `edited`.
    ///
    /// Returns false if the pin does not exist.
    pub async fn update(
        conn: &mut SqliteConnection,
        id: Uuid,
        update: &ValidatedPinUpdate,
        edited: DateTime<Utc>,
    ) -> Result<bool> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE pins SET edited = ");
        query.push_bind(edited);

        if let Some(pin_type) = update.pin_type {
            query.push(", pin_type = ");
            query.push_bind(pin_type.as_i64());
        }
        if let Some(content) = &update.content {
            query.push(", content = ");
            query.push_bind(content.as_str());
            query.push(", content_folded = ");
            query.push_bind(fold_case(content));
        }
        if let Some(flags) = update.flags {
            query.push(", flags = ");
            query.push_bind(flags_to_db(flags));
        }
        if let Some(paths) = &update.attachment_paths {
            query.push(", attachment_paths = ");
            query.push_bind(json_text(paths)?);
        }
        if let Some(metadata) = &update.metadata {
            query.push(", metadata = ");
            query.push_bind(metadata.to_string());
        }

        query.push(" WHERE id = ");
        query.push_bind(id.to_string());

        let result = query.build().execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set (`add`) or clear the given flags on one pin.
    pub async fn change_flags(
        conn: &mut SqliteConnection,
        id: Uuid,
        flags: PinFlags,
        add: bool,
        edited: DateTime<Utc>,
    ) -> Result<bool> {
        let sql = if add {
            "UPDATE pins SET flags = flags | ?, edited = ? WHERE id = ?"
        } else {
            "UPDATE pins SET flags = flags & ~?, edited = ? WHERE id = ?"
        };
        let result = sqlx::query(sql)
            .bind(flags_to_db(flags))
            .bind(edited)
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pins WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn flags_to_db(flags: PinFlags) -> i64 {
    // Known flags occupy the low bits only.
    flags.bits() as i64
}

fn json_text(paths: &[String]) -> Result<String> {
    serde_json::to_string(paths).map_err(|e| CorkboardError::InvalidInput(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct PinRow {
    id: String,
    board_id: String,
    pin_type: i64,
    content: String,
    creator_id: String,
    flags: i64,
    attachment_paths: String,
    metadata: String,
    created: DateTime<Utc>,
    edited: DateTime<Utc>,
}

impl PinRow {
    fn into_pin(self) -> Result<Pin> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            CorkboardError::Database(format!("corrupt pin {}: {what}: {e}", self.id))
        };

        let pin_type = PinType::try_from(self.pin_type).map_err(|e| corrupt("pin_type", &e))?;
        let flags = u64::try_from(self.flags)
            .map_err(|e| corrupt("flags", &e))
            .and_then(|bits| PinFlags::from_bits(bits).map_err(|e| corrupt("flags", &e)))?;
        let attachment_paths: Vec<String> = serde_json::from_str(&self.attachment_paths)
            .map_err(|e| corrupt("attachment_paths", &e))?;
        let metadata: Value =
            serde_json::from_str(&self.metadata).map_err(|e| corrupt("metadata", &e))?;

        Ok(Pin {
            id: parse_uuid(&self.id)?,
            board_id: parse_uuid(&self.board_id)?,
            pin_type,
            content: self.content,
            creator: self.creator_id,
            flags,
            attachment_paths,
            metadata,
            created: self.created,
            edited: self.edited,
        })
    }
}
