//! User repository for corkboard.
//!
//! This module provides CRUD operations for users in the database.

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

use super::like_pattern;
use super::user::{NewUser, User, UserRow};
use crate::auth::PUBLIC_USER_ID;
use crate::{CorkboardError, Result};

const USER_COLUMNS: &str = "id, name, password, pfp_url, settings, created_at";

/// Repository for user CRUD operations.
///
/// The `public` principal has a row so permission entries can reference it,
/// but it is never returned as a user.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// Fails with `Conflict` if the id is taken.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, password, pfp_url, settings, created_at)
             VALUES (?, ?, ?, ?, '{}', ?)",
        )
        .bind(&new_user.id)
        .bind(&new_user.name)
        .bind(&new_user.password)
        .bind(&new_user.pfp_url)
        .bind(Utc::now())
        .execute(self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(CorkboardError::Conflict(format!(
                    "user id '{}' already exists",
                    new_user.id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        self.get_by_id(&new_user.id)
            .await?
            .ok_or_else(|| CorkboardError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        if id == PUBLIC_USER_ID {
            return Ok(None);
        }
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(UserRow::into_user))
    }

    /// Check whether a user id exists.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        if id == PUBLIC_USER_ID {
            return Ok(false);
        }
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(exists)
    }

    /// Return the ids from `ids` that do not resolve to a user, in input order.
    pub async fn missing_ids<'i, I>(&self, ids: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'i str>,
    {
        let mut missing = Vec::new();
        for id in ids {
            if !self.exists(id).await? {
                missing.push(id.to_string());
            }
        }
        Ok(missing)
    }

    /// Replace the stored settings object.
    ///
    /// Returns the updated user, or None if not found.
    pub async fn update_settings(&self, id: &str, settings: &Value) -> Result<Option<User>> {
        let result = sqlx::query("UPDATE users SET settings = ? WHERE id = ?")
            .bind(settings.to_string())
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a user.
    ///
    /// Foreign keys cascade the delete to the boards they created (with their
    /// pins), every permission entry naming them, their favorites and tags.
    /// Returns true if the user existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        if id == PUBLIC_USER_ID {
            return Ok(false);
        }
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Case-insensitive substring search over id and name.
    pub async fn search(&self, filter: &str, limit: i64) -> Result<Vec<User>> {
        let pattern = like_pattern(filter);
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE id != ? AND (id LIKE ? ESCAPE '\\' OR name LIKE ? ESCAPE '\\')
             ORDER BY id LIMIT ?"
        ))
        .bind(PUBLIC_USER_ID)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(UserRow::into_user).collect())
    }

    /// Count all users.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id != ?")
            .bind(PUBLIC_USER_ID)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use serde_json::json;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let user = repo
            .create(&NewUser::new("alice", "Alice", "hash"))
            .await
            .unwrap();
        assert_eq!(user.id, "alice");
        assert_eq!(user.name, "Alice");
        assert_eq!(user.settings, json!({}));

        let fetched = repo.get_by_id("alice").await.unwrap().unwrap();
        assert_eq!(fetched.password, "hash");
        assert!(repo.get_by_id("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_is_conflict() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        repo.create(&NewUser::new("alice", "Alice", "hash"))
            .await
            .unwrap();
        let result = repo.create(&NewUser::new("alice", "Other", "hash")).await;
        assert!(matches!(result, Err(CorkboardError::Conflict(_))));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&NewUser::new("alice", "Alice", "hash"))
            .await
            .unwrap();

        let missing = repo
            .missing_ids(["alice", "ghost", "phantom"])
            .await
            .unwrap();
        assert_eq!(missing, vec!["ghost".to_string(), "phantom".to_string()]);
    }

    #[tokio::test]
    async fn test_update_settings() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&NewUser::new("alice", "Alice", "hash"))
            .await
            .unwrap();

        let user = repo
            .update_settings("alice", &json!({"theme": "dark"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.settings, json!({"theme": "dark"}));

        let none = repo.update_settings("ghost", &json!({})).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&NewUser::new("alice", "Alice Liddell", "h"))
            .await
            .unwrap();
        repo.create(&NewUser::new("bob", "Bob", "h")).await.unwrap();

        let found = repo.search("LIDD", 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "alice");

        let none = repo.search("%", 20).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&NewUser::new("alice", "Alice", "h")).await.unwrap();

        assert!(repo.delete("alice").await.unwrap());
        assert!(!repo.delete("alice").await.unwrap());
        assert!(!repo.exists("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_public_principal_is_not_a_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        assert!(repo.get_by_id(PUBLIC_USER_ID).await.unwrap().is_none());
        assert!(!repo.exists(PUBLIC_USER_ID).await.unwrap());
        assert!(repo.search("pub", 20).await.unwrap().is_empty());
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(!repo.delete(PUBLIC_USER_ID).await.unwrap());
    }
}
