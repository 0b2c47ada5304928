//! Per-user favorite pins.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::DbPool;
use crate::Result;

pub struct FavoriteRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FavoriteRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// The ids from `pin_ids` that `user_id` has favorited, in input order.
    pub async fn favorited(&self, user_id: &str, pin_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let mut found = Vec::new();
        for id in pin_ids {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM pin_favorites WHERE user_id = ? AND pin_id = ?)",
            )
            .bind(user_id)
            .bind(id.to_string())
            .fetch_one(self.pool)
            .await?;
            if exists && !found.contains(id) {
                found.push(*id);
            }
        }
        Ok(found)
    }

    /// Returns false if the pin was already a favorite.
    pub async fn add(
        conn: &mut SqliteConnection,
        user_id: &str,
        pin_id: Uuid,
        created: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO pin_favorites (user_id, pin_id, created) VALUES (?, ?, ?)
             ON CONFLICT(user_id, pin_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(pin_id.to_string())
        .bind(created)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns false if the pin was not a favorite.
    pub async fn remove(conn: &mut SqliteConnection, user_id: &str, pin_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pin_favorites WHERE user_id = ? AND pin_id = ?")
            .bind(user_id)
            .bind(pin_id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
