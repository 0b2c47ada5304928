//! Board repository for corkboard.
//!
//! Reads go through the pool. Writes take a connection so the service can
//! group them into one transaction.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::types::Board;
use crate::auth::{Perm, PermLevel, PermMap};
use crate::db::{fold_case, like_pattern, DbPool};
use crate::{CorkboardError, Result};

const BOARD_COLUMNS: &str = "b.id, b.name, b.description, b.creator_id, b.color, b.created, b.edited,
     (SELECT COUNT(*) FROM pins p WHERE p.board_id = b.id) AS pin_count";

/// Plain board fields to overwrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardFields<'f> {
    pub name: Option<&'f str>,
    pub desc: Option<&'f str>,
    pub color: Option<&'f str>,
}

/// Repository for board and permission-entry storage.
pub struct BoardRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> BoardRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get a board with its permission map.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Board>> {
        let row: Option<BoardRow> =
            sqlx::query_as(&format!("SELECT {BOARD_COLUMNS} FROM boards b WHERE b.id = ?"))
                .bind(id.to_string())
                .fetch_optional(self.pool)
                .await?;

        match row {
            Some(row) => {
                let perms = self.get_perms(id).await?;
                Ok(Some(row.into_board(perms)?))
            }
            None => Ok(None),
        }
    }

    /// Load a board's permission map. Empty if the board does not exist.
    pub async fn get_perms(&self, id: Uuid) -> Result<PermMap> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT user_id, perm_level FROM board_perms WHERE board_id = ?")
                .bind(id.to_string())
                .fetch_all(self.pool)
                .await?;

        rows.into_iter()
            .map(|(user_id, level)| {
                let level: PermLevel = level
                    .parse()
                    .map_err(|e| CorkboardError::Database(format!("corrupt perm entry: {e}")))?;
                Ok((user_id, Perm::new(level)))
            })
            .collect()
    }

    /// Ids of the boards `user_id` created and of the boards whose
    /// permission map names them, in that order without duplicates.
    pub async fn ids_touching_user(&self, user_id: &str) -> Result<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM boards WHERE creator_id = ?
             UNION
             SELECT board_id FROM board_perms WHERE user_id = ?",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.iter().map(|(id,)| parse_uuid(id)).collect()
    }

    /// Boards where `user_id` holds an explicit entry and whose name or
    /// description contains `query` (case-insensitive, Unicode-aware).
    ///
    /// Name matches come first, then newer boards.
    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Board>> {
        let pattern = like_pattern(&fold_case(query));
        let rows: Vec<BoardRow> = sqlx::query_as(&format!(
            "SELECT {BOARD_COLUMNS} FROM boards b
             JOIN board_perms bp ON bp.board_id = b.id AND bp.user_id = ?
             WHERE b.name_folded LIKE ? ESCAPE '\\' OR b.desc_folded LIKE ? ESCAPE '\\'
             ORDER BY CASE WHEN b.name_folded LIKE ? ESCAPE '\\' THEN 0 ELSE 1 END,
                      b.created DESC, b.rowid DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(self.pool)
        .await?;

        let mut boards = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.uuid()?;
            let perms = self.get_perms(id).await?;
            boards.push(row.into_board(perms)?);
        }
        Ok(boards)
    }

    /// Insert a board and its permission map.
    pub async fn insert(conn: &mut SqliteConnection, board: &Board) -> Result<()> {
        sqlx::query(
            "INSERT INTO boards
                (id, name, description, creator_id, color, created, edited, name_folded, desc_folded)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(board.id.to_string())
        .bind(&board.name)
        .bind(&board.desc)
        .bind(&board.creator)
        .bind(&board.color)
        .bind(board.created)
        .bind(board.edited)
        .bind(fold_case(&board.name))
        .bind(fold_case(&board.desc))
        .execute(&mut *conn)
        .await?;

        Self::replace_perms(conn, board.id, &board.perms).await
    }

    /// Overwrite the given fields and bump `edited`.
    ///
    /// Returns false if the board does not exist.
    pub async fn update(
        conn: &mut SqliteConnection,
        id: Uuid,
        fields: BoardFields<'_>,
        edited: DateTime<Utc>,
    ) -> Result<bool> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE boards SET edited = ");
        query.push_bind(edited);

        if let Some(name) = fields.name {
            query.push(", name = ");
            query.push_bind(name);
            query.push(", name_folded = ");
            query.push_bind(fold_case(name));
        }
        if let Some(desc) = fields.desc {
            query.push(", description = ");
            query.push_bind(desc);
            query.push(", desc_folded = ");
            query.push_bind(fold_case(desc));
        }
        if let Some(color) = fields.color {
            query.push(", color = ");
            query.push_bind(color);
        }

        query.push(" WHERE id = ");
        query.push_bind(id.to_string());

        let result = query.build().execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace a board's whole permission map.
    ///
    /// Entries must name existing users (or `public`); an entry for a user
    /// deleted since validation fails with `UnknownUser`.
    pub async fn replace_perms(conn: &mut SqliteConnection, id: Uuid, perms: &PermMap) -> Result<()> {
        sqlx::query("DELETE FROM board_perms WHERE board_id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;

        for (user_id, perm) in perms {
            let result =
                sqlx::query("INSERT INTO board_perms (board_id, user_id, perm_level) VALUES (?, ?, ?)")
                    .bind(id.to_string())
                    .bind(user_id)
                    .bind(perm.perm_level.as_str())
                    .execute(&mut *conn)
                    .await;
            match result {
                Ok(_) => {}
                Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                    return Err(CorkboardError::UnknownUser(user_id.clone()));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Delete a board, its pins and its permission entries.
    ///
    /// Returns false if the board did not exist.
    pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
        let id = id.to_string();
        sqlx::query("DELETE FROM pins WHERE board_id = ?")
            .bind(&id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM board_perms WHERE board_id = ?")
            .bind(&id)
            .execute(&mut *conn)
            .await?;
        let result = sqlx::query("DELETE FROM boards WHERE id = ?")
            .bind(&id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct BoardRow {
    id: String,
    name: String,
    description: String,
    creator_id: String,
    color: String,
    created: DateTime<Utc>,
    edited: DateTime<Utc>,
    pin_count: i64,
}

impl BoardRow {
    fn uuid(&self) -> Result<Uuid> {
        parse_uuid(&self.id)
    }

    fn into_board(self, perms: PermMap) -> Result<Board> {
        Ok(Board {
            id: self.uuid()?,
            name: self.name,
            desc: self.description,
            creator: self.creator_id,
            color: self.color,
            created: self.created,
            edited: self.edited,
            perms,
            pin_count: self.pin_count,
        })
    }
}

pub(super) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| CorkboardError::Database(format!("corrupt id '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::Database;

    async fn setup() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        for id in ["alice", "bob"] {
            users.create(&NewUser::new(id, id, "h")).await.unwrap();
        }
        db
    }

    fn board(name: &str, creator: &str) -> Board {
        let now = Utc::now();
        let mut perms = PermMap::new();
        perms.insert(creator.to_string(), Perm::new(PermLevel::Owner));
        Board {
            id: Uuid::new_v4(),
            name: name.to_string(),
            desc: String::new(),
            creator: creator.to_string(),
            color: "#abcdef".to_string(),
            created: now,
            edited: now,
            perms,
            pin_count: 0,
        }
    }

    async fn insert(db: &Database, board: &Board) {
        let mut conn = db.pool().acquire().await.unwrap();
        BoardRepository::insert(&mut conn, board).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let b = board("Groceries", "alice");
        insert(&db, &b).await;

        let repo = BoardRepository::new(db.pool());
        let loaded = repo.get_by_id(b.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Groceries");
        assert_eq!(loaded.perms, b.perms);
        assert_eq!(loaded.pin_count, 0);

        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_fields() {
        let db = setup().await;
        let b = board("Old", "alice");
        insert(&db, &b).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let fields = BoardFields {
            name: Some("New"),
            ..BoardFields::default()
        };
        assert!(BoardRepository::update(&mut conn, b.id, fields, Utc::now())
            .await
            .unwrap());
        assert!(
            !BoardRepository::update(&mut conn, Uuid::new_v4(), fields, Utc::now())
                .await
                .unwrap()
        );
        drop(conn);

        let loaded = BoardRepository::new(db.pool())
            .get_by_id(b.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.name, "New");
        assert_eq!(loaded.color, "#abcdef");
    }

    #[tokio::test]
    async fn test_search_requires_explicit_entry() {
        let db = setup().await;
        insert(&db, &board("Alice's list", "alice")).await;
        insert(&db, &board("Bob's list", "bob")).await;

        let repo = BoardRepository::new(db.pool());
        let found = repo.search("alice", "LIST", 0, 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].creator, "alice");

        assert!(repo.search("carol", "list", 0, 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_name_matches_first() {
        let db = setup().await;
        let named = board("Recipes", "alice");
        insert(&db, &named).await;
        let described = board("Misc", "alice");
        let described = Board {
            desc: "old recipes".to_string(),
            ..described
        };
        insert(&db, &described).await;

        let found = BoardRepository::new(db.pool())
            .search("alice", "recipes", 0, 20)
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![named.id, described.id]);
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let db = setup().await;
        let summer = Board {
            desc: "Rentrée à l'ÉCOLE".to_string(),
            ..board("Vacances d'été", "alice")
        };
        insert(&db, &summer).await;

        let repo = BoardRepository::new(db.pool());
        for query in ["ÉTÉ", "école", "RENTRÉE"] {
            let found = repo.search("alice", query, 0, 20).await.unwrap();
            assert_eq!(found.len(), 1, "query {query}");
        }

        let mut conn = db.pool().acquire().await.unwrap();
        let fields = BoardFields {
            name: Some("Hiver ÉTERNEL"),
            ..BoardFields::default()
        };
        BoardRepository::update(&mut conn, summer.id, fields, Utc::now())
            .await
            .unwrap();
        drop(conn);
        assert_eq!(repo.search("alice", "éternel", 0, 20).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_perms_rejects_deleted_user() {
        let db = setup().await;
        let b = board("Shared", "alice");
        insert(&db, &b).await;

        let mut perms = b.perms.clone();
        perms.insert("ghost".to_string(), Perm::new(PermLevel::View));
        let mut conn = db.pool().acquire().await.unwrap();
        let result = BoardRepository::replace_perms(&mut conn, b.id, &perms).await;
        assert!(matches!(result, Err(CorkboardError::UnknownUser(ref u)) if u == "ghost"));
    }

    #[tokio::test]
    async fn test_ids_touching_user() {
        let db = setup().await;
        let own = board("Bob's", "bob");
        insert(&db, &own).await;
        let mut shared = board("Alice's", "alice");
        shared.perms.insert("bob".to_string(), Perm::new(PermLevel::View));
        insert(&db, &shared).await;
        insert(&db, &board("Private", "alice")).await;

        let mut ids = BoardRepository::new(db.pool())
            .ids_touching_user("bob")
            .await
            .unwrap();
        ids.sort();
        let mut expected = vec![own.id, shared.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_delete_removes_perms() {
        let db = setup().await;
        let b = board("Temp", "alice");
        insert(&db, &b).await;

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(BoardRepository::delete(&mut conn, b.id).await.unwrap());
        assert!(!BoardRepository::delete(&mut conn, b.id).await.unwrap());
        drop(conn);

        let repo = BoardRepository::new(db.pool());
        assert!(repo.get_perms(b.id).await.unwrap().is_empty());
    }
}
