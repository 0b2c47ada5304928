//! Board service for corkboard.
//!
//! High-level board operations with permission checks. Every mutation
//! validates its input first, then takes the board's write lock, loads the
//! current state, authorizes, and commits in one transaction.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::lock::BoardLocks;
use super::repository::{BoardFields, BoardRepository};
use super::types::{validate_board_name, validate_color, Board, BoardUpdate, NewBoard, Pagination};
use crate::auth::permission::{self, Action, PermEdit};
use crate::auth::{PermLevel, PermMap, PUBLIC_USER_ID};
use crate::config::BoardConfig;
use crate::db::{Database, UserRepository};
use crate::{CorkboardError, Result};

/// Service for board operations with permission checking.
pub struct BoardService<'a> {
    db: &'a Database,
    locks: &'a BoardLocks,
    config: &'a BoardConfig,
}

impl<'a> BoardService<'a> {
    pub fn new(db: &'a Database, locks: &'a BoardLocks, config: &'a BoardConfig) -> Self {
        Self { db, locks, config }
    }

    fn repo(&self) -> BoardRepository<'a> {
        BoardRepository::new(self.db.pool())
    }

    /// Create a board owned by `caller`.
    ///
    /// `caller` is always stored as `Owner`, whatever `perms` says about them.
    pub async fn create(&self, caller: &str, new_board: NewBoard) -> Result<Board> {
        validate_board_name(&new_board.name)?;
        validate_color(&new_board.color)?;
        validate_perm_map(self.db, &new_board.perms).await?;

        let now = Utc::now();
        let board = Board {
            id: Uuid::new_v4(),
            name: new_board.name,
            desc: new_board.desc,
            creator: caller.to_string(),
            color: new_board.color,
            created: now,
            edited: now,
            perms: permission::initial_perms(caller, &new_board.perms),
            pin_count: 0,
        };

        let mut tx = self.db.pool().begin().await?;
        BoardRepository::insert(&mut *tx, &board).await?;
        tx.commit().await?;

        info!(board_id = %board.id, creator = %caller, "Board created");
        Ok(board)
    }

    /// Get a board the caller can read. `None` is an anonymous caller.
    pub async fn get(&self, caller: Option<&str>, id: Uuid) -> Result<Board> {
        let _guard = self.locks.read(id).await?;
        let board = self.load(id).await?;
        permission::authorize(&board.perms, caller, Action::Read)?;
        Ok(board)
    }

    /// Partially update a board.
    ///
    /// Requires `Edit`. A `perms` map is merged into the existing one; if the
    /// merge changes anything the caller also needs `ManagePerms`.
    pub async fn edit(&self, caller: &str, id: Uuid, update: BoardUpdate) -> Result<Board> {
        update.validate()?;
        if let Some(perms) = &update.perms {
            validate_perm_map(self.db, perms).await?;
        }

        let _guard = self.locks.write(id).await?;
        let board = self.load(id).await?;
        permission::authorize(&board.perms, Some(caller), Action::Edit)?;

        let perm_edit = match &update.perms {
            Some(incoming) => {
                let edit = permission::apply_edit(&board.perms, &board.creator, caller, incoming);
                self.check_perm_change(&board, caller, &edit)?;
                Some(edit)
            }
            None => None,
        };

        let fields = BoardFields {
            name: update.name.as_deref(),
            desc: update.desc.as_deref(),
            color: update.color.as_deref(),
        };

        let mut tx = self.db.pool().begin().await?;
        BoardRepository::update(&mut *tx, id, fields, Utc::now()).await?;
        if let Some(edit) = perm_edit.as_ref().filter(|e| e.changes(&board.perms)) {
            BoardRepository::replace_perms(&mut *tx, id, &edit.perms).await?;
        }
        tx.commit().await?;

        info!(board_id = %id, user_id = %caller, "Board edited");
        self.load(id).await
    }

    /// Grant and revoke entries. Requires `ManagePerms`.
    ///
    /// The creator's entry and an owner caller's own entry survive revocation.
    pub async fn share(
        &self,
        caller: &str,
        id: Uuid,
        grants: &PermMap,
        revokes: &[String],
    ) -> Result<Board> {
        validate_perm_map(self.db, grants).await?;

        let _guard = self.locks.write(id).await?;
        let board = self.load(id).await?;
        permission::authorize(&board.perms, Some(caller), Action::ManagePerms)?;

        let granted = permission::apply_edit(&board.perms, &board.creator, caller, grants);
        let edit = permission::apply_revoke(&granted.perms, &board.creator, caller, revokes);
        log_restored(id, &granted);
        log_restored(id, &edit);

        if edit.changes(&board.perms) {
            let mut tx = self.db.pool().begin().await?;
            BoardRepository::replace_perms(&mut *tx, id, &edit.perms).await?;
            BoardRepository::update(&mut *tx, id, BoardFields::default(), Utc::now()).await?;
            tx.commit().await?;
            info!(board_id = %id, user_id = %caller, "Board sharing changed");
        }

        self.load(id).await
    }

    /// Delete a board and all of its pins. Requires `Owner`.
    pub async fn delete(&self, caller: &str, id: Uuid) -> Result<()> {
        {
            let _guard = self.locks.write(id).await?;
            let board = self.load(id).await?;
            permission::authorize(&board.perms, Some(caller), Action::Delete)?;

            let mut tx = self.db.pool().begin().await?;
            BoardRepository::delete(&mut *tx, id).await?;
            tx.commit().await?;
        }
        self.locks.forget(id);

        info!(board_id = %id, user_id = %caller, "Board deleted");
        Ok(())
    }

    /// Search boards the caller is explicitly listed on.
    ///
    /// Boards visible only through the public entry are not listed, and an
    /// anonymous caller gets no results.
    pub async fn search(
        &self,
        caller: Option<&str>,
        query: &str,
        page: Pagination,
    ) -> Result<Vec<Board>> {
        let Some(caller) = caller else {
            return Ok(Vec::new());
        };

        let limit = page.effective_limit(
            self.config.default_search_limit,
            self.config.max_search_limit,
        );
        let boards = self.repo().search(caller, query, page.offset, limit).await?;
        debug!(user_id = %caller, query = %query, results = boards.len(), "Board search");
        Ok(boards)
    }

    /// Set the color of several boards. Requires `Edit` on every one of them;
    /// nothing is written unless all checks pass.
    pub async fn bulk_set_color(&self, caller: &str, ids: &[Uuid], color: &str) -> Result<usize> {
        validate_color(color)?;

        let _guards = self.locks.write_many(ids).await?;
        let mut targets = Vec::with_capacity(ids.len());
        for &id in ids {
            let board = self.load(id).await?;
            permission::authorize(&board.perms, Some(caller), Action::Edit)?;
            if !targets.contains(&id) {
                targets.push(id);
            }
        }

        let fields = BoardFields {
            color: Some(color),
            ..BoardFields::default()
        };
        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        for &id in &targets {
            BoardRepository::update(&mut *tx, id, fields, now).await?;
        }
        tx.commit().await?;

        info!(user_id = %caller, count = targets.len(), color = %color, "Board colors changed");
        Ok(targets.len())
    }

    /// Permission maps of several boards. Requires read access to every one
    /// of them.
    pub async fn bulk_perms(
        &self,
        caller: Option<&str>,
        ids: &[Uuid],
    ) -> Result<BTreeMap<Uuid, PermMap>> {
        let _guards = self.locks.read_many(ids).await?;
        let mut maps = BTreeMap::new();
        for &id in ids {
            if maps.contains_key(&id) {
                continue;
            }
            let board = self.load(id).await?;
            permission::authorize(&board.perms, caller, Action::Read)?;
            maps.insert(id, board.perms);
        }
        Ok(maps)
    }

    /// Apply the same grants and revocations to several boards. Requires
    /// `ManagePerms` on every one of them; nothing is written unless all
    /// checks pass.
    ///
    /// Returns how many boards changed.
    pub async fn bulk_share(
        &self,
        caller: &str,
        ids: &[Uuid],
        grants: &PermMap,
        revokes: &[String],
    ) -> Result<usize> {
        validate_perm_map(self.db, grants).await?;

        let _guards = self.locks.write_many(ids).await?;
        let mut changed: Vec<(Uuid, PermMap)> = Vec::new();
        let mut seen = Vec::with_capacity(ids.len());
        for &id in ids {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);

            let board = self.load(id).await?;
            permission::authorize(&board.perms, Some(caller), Action::ManagePerms)?;
            let granted = permission::apply_edit(&board.perms, &board.creator, caller, grants);
            let edit = permission::apply_revoke(&granted.perms, &board.creator, caller, revokes);
            log_restored(id, &granted);
            log_restored(id, &edit);
            if edit.changes(&board.perms) {
                changed.push((id, edit.perms));
            }
        }

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        for (id, perms) in &changed {
            BoardRepository::replace_perms(&mut *tx, *id, perms).await?;
            BoardRepository::update(&mut *tx, *id, BoardFields::default(), now).await?;
        }
        tx.commit().await?;

        info!(user_id = %caller, count = changed.len(), "Board sharing changed");
        Ok(changed.len())
    }

    async fn load(&self, id: Uuid) -> Result<Board> {
        self.repo()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CorkboardError::NotFound(format!("board {id}")))
    }

    fn check_perm_change(&self, board: &Board, caller: &str, edit: &PermEdit) -> Result<()> {
        log_restored(board.id, edit);
        if edit.changes(&board.perms) {
            permission::authorize(&board.perms, Some(caller), Action::ManagePerms)?;
        }
        Ok(())
    }
}

fn log_restored(board_id: Uuid, edit: &PermEdit) {
    for user_id in &edit.restored {
        warn!(board_id = %board_id, user_id = %user_id, "Owner entry restored after edit");
    }
}

/// Reject an incoming map with a bad public entry or unknown users.
///
/// Runs before any lock or write.
pub(crate) async fn validate_perm_map(db: &Database, perms: &PermMap) -> Result<()> {
    permission::validate_incoming(perms)?;

    let ids: Vec<&str> = perms
        .keys()
        .map(String::as_str)
        .filter(|id| *id != PUBLIC_USER_ID)
        .collect();
    let missing = UserRepository::new(db.pool()).missing_ids(ids).await?;
    if !missing.is_empty() {
        return Err(CorkboardError::UnknownUser(missing.join(", ")));
    }
    Ok(())
}

/// Resolve `caller`'s level on a board, for display.
pub fn caller_level(board: &Board, caller: Option<&str>) -> Option<PermLevel> {
    permission::resolve(&board.perms, caller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Perm;
    use crate::db::NewUser;
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
            for id in ["alice", "bob", "carol"] {
                users.create(&NewUser::new(id, id, "h")).await.unwrap();
            }
            Self {
                db,
                locks: BoardLocks::new(Duration::from_millis(200)),
                config: BoardConfig::default(),
            }
        }

        fn service(&self) -> BoardService<'_> {
            BoardService::new(&self.db, &self.locks, &self.config)
        }
    }

    fn perms(entries: &[(&str, PermLevel)]) -> PermMap {
        entries
            .iter()
            .map(|(id, level)| (id.to_string(), Perm::new(*level)))
            .collect()
    }

    #[tokio::test]
    async fn test_create_forces_owner() {
        let fx = Fixture::new().await;
        let board = fx
            .service()
            .create(
                "alice",
                NewBoard::new("Plans", "#112233")
                    .with_perms(perms(&[("alice", PermLevel::View), ("bob", PermLevel::Edit)])),
            )
            .await
            .unwrap();

        assert_eq!(board.perms["alice"].perm_level, PermLevel::Owner);
        assert_eq!(board.perms["bob"].perm_level, PermLevel::Edit);
        assert_eq!(caller_level(&board, Some("bob")), Some(PermLevel::Edit));
    }

    #[tokio::test]
    async fn test_create_rejects_public_above_view() {
        let fx = Fixture::new().await;
        let result = fx
            .service()
            .create(
                "alice",
                NewBoard::new("Plans", "#112233")
                    .with_perms(perms(&[(PUBLIC_USER_ID, PermLevel::Edit)])),
            )
            .await;
        assert!(matches!(result, Err(CorkboardError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_get_permissions() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let board = svc
            .create("alice", NewBoard::new("Private", "#000000"))
            .await
            .unwrap();

        assert!(svc.get(Some("alice"), board.id).await.is_ok());
        assert!(matches!(
            svc.get(Some("bob"), board.id).await,
            Err(CorkboardError::NotAuthorized(_))
        ));
        assert!(matches!(
            svc.get(None, board.id).await,
            Err(CorkboardError::NotAuthorized(_))
        ));
        assert!(matches!(
            svc.get(Some("alice"), Uuid::new_v4()).await,
            Err(CorkboardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_public_board_readable_not_listed() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let board = svc
            .create(
                "alice",
                NewBoard::new("Open house", "#000000")
                    .with_perms(perms(&[(PUBLIC_USER_ID, PermLevel::View)])),
            )
            .await
            .unwrap();

        assert!(svc.get(None, board.id).await.is_ok());
        assert!(svc.get(Some("bob"), board.id).await.is_ok());
        assert!(svc
            .search(Some("bob"), "open", Pagination::default())
            .await
            .unwrap()
            .is_empty());
        assert!(svc
            .search(None, "open", Pagination::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_editor_cannot_change_perms() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let board = svc
            .create(
                "alice",
                NewBoard::new("Shared", "#000000").with_perms(perms(&[("bob", PermLevel::Edit)])),
            )
            .await
            .unwrap();

        // Same map, or an empty one, is fine.
        let edited = svc
            .edit(
                "bob",
                board.id,
                BoardUpdate::new().name("Renamed").perms(PermMap::new()),
            )
            .await
            .unwrap();
        assert_eq!(edited.name, "Renamed");

        let result = svc
            .edit(
                "bob",
                board.id,
                BoardUpdate::new().perms(perms(&[("carol", PermLevel::View)])),
            )
            .await;
        assert!(matches!(result, Err(CorkboardError::NotAuthorized(_))));
        assert!(!svc
            .get(Some("alice"), board.id)
            .await
            .unwrap()
            .perms
            .contains_key("carol"));
    }

    #[tokio::test]
    async fn test_viewer_cannot_edit() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let board = svc
            .create(
                "alice",
                NewBoard::new("Shared", "#000000").with_perms(perms(&[("bob", PermLevel::View)])),
            )
            .await
            .unwrap();

        let result = svc
            .edit("bob", board.id, BoardUpdate::new().name("Mine"))
            .await;
        assert!(matches!(result, Err(CorkboardError::NotAuthorized(_))));
    }

    #[tokio::test]
    async fn test_edit_validates_before_writing() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let board = svc
            .create("alice", NewBoard::new("Stable", "#000000"))
            .await
            .unwrap();

        let result = svc
            .edit(
                "alice",
                board.id,
                BoardUpdate::new().name("Changed").color("red"),
            )
            .await;
        assert!(matches!(result, Err(CorkboardError::InvalidInput(_))));

        let result = svc
            .edit(
                "alice",
                board.id,
                BoardUpdate::new()
                    .name("Changed")
                    .perms(perms(&[("ghost", PermLevel::View)])),
            )
            .await;
        assert!(matches!(result, Err(CorkboardError::UnknownUser(_))));

        assert_eq!(svc.get(Some("alice"), board.id).await.unwrap().name, "Stable");
    }

    #[tokio::test]
    async fn test_share_and_revoke() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let board = svc
            .create("alice", NewBoard::new("Team", "#000000"))
            .await
            .unwrap();

        let board = svc
            .share(
                "alice",
                board.id,
                &perms(&[("bob", PermLevel::Owner), ("carol", PermLevel::View)]),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(board.perms.len(), 3);

        // A co-owner cannot revoke the creator or themselves.
        let board = svc
            .share(
                "bob",
                board.id,
                &PermMap::new(),
                &["alice".to_string(), "bob".to_string(), "carol".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(
            board.perms,
            perms(&[("alice", PermLevel::Owner), ("bob", PermLevel::Owner)])
        );

        // The creator can demote a co-owner.
        let board = svc
            .share("alice", board.id, &perms(&[("bob", PermLevel::Edit)]), &[])
            .await
            .unwrap();
        assert_eq!(board.perms["bob"].perm_level, PermLevel::Edit);

        let result = svc
            .share("bob", board.id, &perms(&[("carol", PermLevel::View)]), &[])
            .await;
        assert!(matches!(result, Err(CorkboardError::NotAuthorized(_))));
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let board = svc
            .create(
                "alice",
                NewBoard::new("Doomed", "#000000").with_perms(perms(&[("bob", PermLevel::Edit)])),
            )
            .await
            .unwrap();

        assert!(matches!(
            svc.delete("bob", board.id).await,
            Err(CorkboardError::NotAuthorized(_))
        ));
        svc.delete("alice", board.id).await.unwrap();
        assert!(matches!(
            svc.get(Some("alice"), board.id).await,
            Err(CorkboardError::NotFound(_))
        ));
        assert!(matches!(
            svc.delete("alice", board.id).await,
            Err(CorkboardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bulk_set_color_all_or_nothing() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let mine = svc
            .create("alice", NewBoard::new("Mine", "#000000"))
            .await
            .unwrap();
        let theirs = svc
            .create("bob", NewBoard::new("Theirs", "#000000"))
            .await
            .unwrap();

        let result = svc
            .bulk_set_color("alice", &[mine.id, theirs.id], "#ffffff")
            .await;
        assert!(matches!(result, Err(CorkboardError::NotAuthorized(_))));
        assert_eq!(svc.get(Some("alice"), mine.id).await.unwrap().color, "#000000");

        assert_eq!(
            svc.bulk_set_color("alice", &[mine.id, mine.id], "#ffffff")
                .await
                .unwrap(),
            1
        );
        assert_eq!(svc.get(Some("alice"), mine.id).await.unwrap().color, "#ffffff");
    }

    #[tokio::test]
    async fn test_bulk_perms_requires_read_on_all() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let shared = svc
            .create(
                "alice",
                NewBoard::new("Shared", "#000000").with_perms(perms(&[("bob", PermLevel::View)])),
            )
            .await
            .unwrap();
        let private = svc
            .create("alice", NewBoard::new("Private", "#000000"))
            .await
            .unwrap();

        let maps = svc
            .bulk_perms(Some("alice"), &[shared.id, private.id, shared.id])
            .await
            .unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[&shared.id], shared.perms);

        assert!(matches!(
            svc.bulk_perms(Some("bob"), &[shared.id, private.id]).await,
            Err(CorkboardError::NotAuthorized(_))
        ));
        assert!(matches!(
            svc.bulk_perms(Some("alice"), &[Uuid::new_v4()]).await,
            Err(CorkboardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bulk_share_all_or_nothing() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let a = svc
            .create("alice", NewBoard::new("A", "#000000"))
            .await
            .unwrap();
        let b = svc
            .create("alice", NewBoard::new("B", "#000000"))
            .await
            .unwrap();
        let bobs = svc
            .create("bob", NewBoard::new("Bob's", "#000000"))
            .await
            .unwrap();

        let grants = perms(&[("carol", PermLevel::Edit)]);
        let result = svc
            .bulk_share("alice", &[a.id, bobs.id], &grants, &[])
            .await;
        assert!(matches!(result, Err(CorkboardError::NotAuthorized(_))));
        assert!(!svc
            .get(Some("alice"), a.id)
            .await
            .unwrap()
            .perms
            .contains_key("carol"));

        assert_eq!(
            svc.bulk_share("alice", &[a.id, b.id, a.id], &grants, &[])
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            svc.bulk_share("alice", &[a.id, b.id], &grants, &[])
                .await
                .unwrap(),
            0
        );

        let revoked = svc
            .bulk_share("alice", &[b.id], &PermMap::new(), &["carol".to_string()])
            .await
            .unwrap();
        assert_eq!(revoked, 1);
        let maps = svc.bulk_perms(Some("alice"), &[a.id, b.id]).await.unwrap();
        assert_eq!(maps[&a.id]["carol"].perm_level, PermLevel::Edit);
        assert!(!maps[&b.id].contains_key("carol"));

        let ghost = perms(&[("ghost", PermLevel::View)]);
        assert!(matches!(
            svc.bulk_share("alice", &[a.id], &ghost, &[]).await,
            Err(CorkboardError::UnknownUser(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_times_out_when_board_is_busy() {
        let fx = Fixture::new().await;
        let svc = fx.service();
        let board = svc
            .create("alice", NewBoard::new("Busy", "#000000"))
            .await
            .unwrap();

        let _held = fx.locks.write(board.id).await.unwrap();
        let result = svc
            .edit("alice", board.id, BoardUpdate::new().name("Nope"))
            .await;
        assert!(matches!(result, Err(CorkboardError::Conflict(_))));
    }
}
