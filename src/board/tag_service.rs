//! Tag service for corkboard.
//!
//! Tags belong to one user and are invisible to everyone else: another
//! user's tag id behaves exactly like a missing one. Filing a board under a
//! tag requires read access to the board, checked under its shared lock.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::lock::{BoardLocks, BoardReadGuard};
use super::repository::BoardRepository;
use super::tag::{NewTag, Tag, TagUpdate};
use super::tag_repository::TagRepository;
use super::types::validate_color;
use crate::auth::permission::{self, Action};
use crate::db::Database;
use crate::{CorkboardError, Result};

pub struct TagService<'a> {
    db: &'a Database,
    locks: &'a BoardLocks,
}

impl<'a> TagService<'a> {
    pub fn new(db: &'a Database, locks: &'a BoardLocks) -> Self {
        Self { db, locks }
    }

    fn repo(&self) -> TagRepository<'a> {
        TagRepository::new(self.db.pool())
    }

    pub async fn get(&self, caller: &str, id: i64) -> Result<Tag> {
        self.repo()
            .get(caller, id)
            .await?
            .ok_or_else(|| CorkboardError::NotFound(format!("tag {id}")))
    }

    pub async fn list(&self, caller: &str) -> Result<Vec<Tag>> {
        self.repo().list(caller).await
    }

    /// Lock `board_ids` shared and check the caller can read each of them.
    async fn readable_boards(&self, caller: &str, board_ids: &[Uuid]) -> Result<Vec<BoardReadGuard>> {
        let guards = self.locks.read_many(board_ids).await?;
        let boards = BoardRepository::new(self.db.pool());
        for &board_id in board_ids {
            let board = boards
                .get_by_id(board_id)
                .await?
                .ok_or_else(|| CorkboardError::NotFound(format!("board {board_id}")))?;
            permission::authorize(&board.perms, Some(caller), Action::Read)?;
        }
        Ok(guards)
    }

    pub async fn create(&self, caller: &str, new_tag: NewTag) -> Result<Tag> {
        new_tag.validate()?;
        let _guards = self.readable_boards(caller, &new_tag.board_ids).await?;

        let mut tx = self.db.pool().begin().await?;
        let id =
            TagRepository::insert(&mut *tx, caller, &new_tag.name, &new_tag.color, Utc::now())
                .await?;
        for &board_id in &new_tag.board_ids {
            TagRepository::add_board(&mut *tx, id, board_id).await?;
        }
        tx.commit().await?;

        info!(tag_id = id, user_id = %caller, "Tag created");
        self.get(caller, id).await
    }

    /// Rename, recolor, or replace the board list of a tag.
    pub async fn modify(&self, caller: &str, id: i64, update: TagUpdate) -> Result<Tag> {
        update.validate()?;
        self.get(caller, id).await?;
        let board_ids = update.board_ids.as_deref().unwrap_or_default();
        let _guards = self.readable_boards(caller, board_ids).await?;

        let mut tx = self.db.pool().begin().await?;
        TagRepository::update(&mut *tx, id, update.name.as_deref(), update.color.as_deref())
            .await?;
        if let Some(board_ids) = &update.board_ids {
            TagRepository::clear_boards(&mut *tx, id).await?;
            for &board_id in board_ids {
                TagRepository::add_board(&mut *tx, id, board_id).await?;
            }
        }
        tx.commit().await?;

        info!(tag_id = id, user_id = %caller, "Tag modified");
        self.get(caller, id).await
    }

    /// File boards under a tag and take others out of it.
    ///
    /// Added boards must be readable; removed ones need not be.
    pub async fn add_remove_boards(
        &self,
        caller: &str,
        id: i64,
        add: &[Uuid],
        remove: &[Uuid],
    ) -> Result<Tag> {
        self.get(caller, id).await?;
        let _guards = self.readable_boards(caller, add).await?;

        let mut tx = self.db.pool().begin().await?;
        for &board_id in add {
            TagRepository::add_board(&mut *tx, id, board_id).await?;
        }
        for &board_id in remove {
            TagRepository::remove_board(&mut *tx, id, board_id).await?;
        }
        tx.commit().await?;

        self.get(caller, id).await
    }

    /// Move a board out of whichever of the caller's tags hold it and into
    /// `to_tag`.
    pub async fn move_board(&self, caller: &str, board_id: Uuid, to_tag: i64) -> Result<Tag> {
        self.get(caller, to_tag).await?;
        let _guards = self.readable_boards(caller, &[board_id]).await?;

        let mut tx = self.db.pool().begin().await?;
        TagRepository::untag_board(&mut *tx, caller, board_id).await?;
        TagRepository::add_board(&mut *tx, to_tag, board_id).await?;
        tx.commit().await?;

        info!(board_id = %board_id, tag_id = to_tag, user_id = %caller, "Board moved between tags");
        self.get(caller, to_tag).await
    }

    /// Recolor several tags. Every id must be one of the caller's tags.
    pub async fn bulk_set_color(&self, caller: &str, ids: &[i64], color: &str) -> Result<usize> {
        validate_color(color)?;
        let ids = self.owned(caller, ids).await?;

        let mut tx = self.db.pool().begin().await?;
        for &id in &ids {
            TagRepository::update(&mut *tx, id, None, Some(color)).await?;
        }
        tx.commit().await?;
        Ok(ids.len())
    }

    /// Delete several tags. The boards themselves are untouched.
    pub async fn delete(&self, caller: &str, ids: &[i64]) -> Result<usize> {
        let ids = self.owned(caller, ids).await?;

        let mut tx = self.db.pool().begin().await?;
        for &id in &ids {
            TagRepository::delete(&mut *tx, id).await?;
        }
        tx.commit().await?;

        info!(user_id = %caller, count = ids.len(), "Tags deleted");
        Ok(ids.len())
    }

    /// Deduplicate `ids`, failing with `NotFound` unless the caller owns all.
    async fn owned(&self, caller: &str, ids: &[i64]) -> Result<Vec<i64>> {
        let mut owned = Vec::with_capacity(ids.len());
        for &id in ids {
            if owned.contains(&id) {
                continue;
            }
            self.get(caller, id).await?;
            owned.push(id);
        }
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Perm, PermLevel, PermMap};
    use crate::board::service::BoardService;
    use crate::board::types::NewBoard;
    use crate::config::BoardConfig;
    use crate::db::{NewUser, UserRepository};
    use std::time::Duration;

    struct Fixture {
        db: Database,
        locks: BoardLocks,
        config: BoardConfig,
    }

    impl Fixture {
        async fn new() -> Self {
            let db = Database::open_in_memory().await.unwrap();
            let users = UserRepository::new(db.pool());
            for id in ["alice", "bob"] {
                users.create(&NewUser::new(id, id, "h")).await.unwrap();
            }
            Self {
                db,
                locks: BoardLocks::new(Duration::from_millis(200)),
                config: BoardConfig::default(),
            }
        }

        fn tags(&self) -> TagService<'_> {
            TagService::new(&self.db, &self.locks)
        }

        async fn board(&self, owner: &str, shared_with: Option<&str>) -> Uuid {
            let perms: PermMap = shared_with
                .map(|user| (user.to_string(), Perm::new(PermLevel::View)))
                .into_iter()
                .collect();
            BoardService::new(&self.db, &self.locks, &self.config)
                .create(owner, NewBoard::new("Board", "#000000").with_perms(perms))
                .await
                .unwrap()
                .id
        }
    }

    #[tokio::test]
    async fn test_tags_are_private() {
        let fx = Fixture::new().await;
        let svc = fx.tags();
        let tag = svc
            .create("alice", NewTag::new("Work", "#112233"))
            .await
            .unwrap();

        assert_eq!(svc.list("alice").await.unwrap(), vec![tag.clone()]);
        assert!(svc.list("bob").await.unwrap().is_empty());
        assert!(matches!(
            svc.get("bob", tag.id).await,
            Err(CorkboardError::NotFound(_))
        ));
        assert!(matches!(
            svc.delete("bob", &[tag.id]).await,
            Err(CorkboardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_filing_requires_read_access() {
        let fx = Fixture::new().await;
        let shared = fx.board("bob", Some("alice")).await;
        let private = fx.board("bob", None).await;
        let svc = fx.tags();

        let tag = svc
            .create("alice", NewTag::new("Bob's", "#112233").with_boards(vec![shared]))
            .await
            .unwrap();
        assert_eq!(tag.board_ids, vec![shared]);

        let result = svc
            .add_remove_boards("alice", tag.id, &[private], &[])
            .await;
        assert!(matches!(result, Err(CorkboardError::NotAuthorized(_))));
        let result = svc
            .create("alice", NewTag::new("Nope", "#112233").with_boards(vec![Uuid::new_v4()]))
            .await;
        assert!(matches!(result, Err(CorkboardError::NotFound(_))));

        let tag = svc
            .add_remove_boards("alice", tag.id, &[], &[shared])
            .await
            .unwrap();
        assert!(tag.board_ids.is_empty());
    }

    #[tokio::test]
    async fn test_modify_and_move() {
        let fx = Fixture::new().await;
        let a = fx.board("alice", None).await;
        let b = fx.board("alice", None).await;
        let svc = fx.tags();

        let home = svc
            .create("alice", NewTag::new("Home", "#000000").with_boards(vec![a, b]))
            .await
            .unwrap();
        let work = svc
            .create("alice", NewTag::new("Work", "#000000"))
            .await
            .unwrap();

        let work = svc.move_board("alice", a, work.id).await.unwrap();
        assert_eq!(work.board_ids, vec![a]);
        assert_eq!(svc.get("alice", home.id).await.unwrap().board_ids, vec![b]);

        let home = svc
            .modify(
                "alice",
                home.id,
                TagUpdate::new().name("House").board_ids(vec![a]),
            )
            .await
            .unwrap();
        assert_eq!(home.name, "House");
        assert_eq!(home.color, "#000000");
        assert_eq!(home.board_ids, vec![a]);

        assert!(matches!(
            svc.modify("alice", home.id, TagUpdate::new().color("red")).await,
            Err(CorkboardError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_bulk_color_and_delete() {
        let fx = Fixture::new().await;
        let board = fx.board("alice", None).await;
        let svc = fx.tags();
        let one = svc
            .create("alice", NewTag::new("One", "#000000").with_boards(vec![board]))
            .await
            .unwrap();
        let two = svc
            .create("alice", NewTag::new("Two", "#000000"))
            .await
            .unwrap();
        let bobs = svc
            .create("bob", NewTag::new("Bob", "#000000"))
            .await
            .unwrap();

        assert!(matches!(
            svc.bulk_set_color("alice", &[one.id, bobs.id], "#ffffff").await,
            Err(CorkboardError::NotFound(_))
        ));
        assert_eq!(svc.get("alice", one.id).await.unwrap().color, "#000000");

        assert_eq!(
            svc.bulk_set_color("alice", &[one.id, two.id, one.id], "#ffffff")
                .await
                .unwrap(),
            2
        );
        assert_eq!(svc.get("alice", two.id).await.unwrap().color, "#ffffff");

        assert_eq!(svc.delete("alice", &[one.id, two.id]).await.unwrap(), 2);
        assert!(svc.list("alice").await.unwrap().is_empty());
        assert_eq!(svc.list("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_board_leaves_tags() {
        let fx = Fixture::new().await;
        let board = fx.board("alice", None).await;
        let svc = fx.tags();
        let tag = svc
            .create("alice", NewTag::new("Tmp", "#000000").with_boards(vec![board]))
            .await
            .unwrap();

        BoardService::new(&fx.db, &fx.locks, &fx.config)
            .delete("alice", board)
            .await
            .unwrap();
        assert!(svc.get("alice", tag.id).await.unwrap().board_ids.is_empty());
    }
}
