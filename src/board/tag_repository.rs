//! Tag repository for corkboard.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::repository::parse_uuid;
use super::tag::Tag;
use crate::db::DbPool;
use crate::Result;

pub struct TagRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> TagRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get a tag owned by `owner_id`. Someone else's tag is `None`.
    pub async fn get(&self, owner_id: &str, id: i64) -> Result<Option<Tag>> {
        let row: Option<TagRow> = sqlx::query_as(
            "SELECT id, owner_id, name, color, created FROM tags WHERE id = ? AND owner_id = ?",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_boards(row).await?)),
            None => Ok(None),
        }
    }

    /// Every tag of `owner_id`, oldest first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<Tag>> {
        let rows: Vec<TagRow> = sqlx::query_as(
            "SELECT id, owner_id, name, color, created FROM tags
             WHERE owner_id = ? ORDER BY created, id",
        )
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        let mut tags = Vec::with_capacity(rows.len());
        for row in rows {
            tags.push(self.with_boards(row).await?);
        }
        Ok(tags)
    }

    async fn with_boards(&self, row: TagRow) -> Result<Tag> {
        let boards: Vec<(String,)> =
            sqlx::query_as("SELECT board_id FROM tag_boards WHERE tag_id = ? ORDER BY rowid")
                .bind(row.id)
                .fetch_all(self.pool)
                .await?;
        let board_ids = boards
            .iter()
            .map(|(id,)| parse_uuid(id))
            .collect::<Result<Vec<_>>>()?;

        Ok(Tag {
            id: row.id,
            owner: row.owner_id,
            name: row.name,
            color: row.color,
            created: row.created,
            board_ids,
        })
    }

    /// Insert a tag and return its id.
    pub async fn insert(
        conn: &mut SqliteConnection,
        owner_id: &str,
        name: &str,
        color: &str,
        created: DateTime<Utc>,
    ) -> Result<i64> {
        let result =
            sqlx::query("INSERT INTO tags (owner_id, name, color, created) VALUES (?, ?, ?, ?)")
                .bind(owner_id)
                .bind(name)
                .bind(color)
                .bind(created)
                .execute(&mut *conn)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE tags SET name = COALESCE(?, name), color = COALESCE(?, color) WHERE id = ?")
            .bind(name)
            .bind(color)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Returns false if the board was already filed under the tag.
    pub async fn add_board(conn: &mut SqliteConnection, id: i64, board_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO tag_boards (tag_id, board_id) VALUES (?, ?)
             ON CONFLICT(tag_id, board_id) DO NOTHING",
        )
        .bind(id)
        .bind(board_id.to_string())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_board(conn: &mut SqliteConnection, id: i64, board_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tag_boards WHERE tag_id = ? AND board_id = ?")
            .bind(id)
            .bind(board_id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_boards(conn: &mut SqliteConnection, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM tag_boards WHERE tag_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Take a board out of every tag of `owner_id`.
    pub async fn untag_board(
        conn: &mut SqliteConnection,
        owner_id: &str,
        board_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM tag_boards WHERE board_id = ?
                AND tag_id IN (SELECT id FROM tags WHERE owner_id = ?)",
        )
        .bind(board_id.to_string())
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i64,
    owner_id: String,
    name: String,
    color: String,
    created: DateTime<Utc>,
}
