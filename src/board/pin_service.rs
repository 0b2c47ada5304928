//! Pin service for corkboard.
//!
//! Pins carry no permissions of their own: every check runs against the
//! parent board's map, under the parent board's lock.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::favorites::FavoriteRepository;
use super::flags::FlagsInput;
use super::history::{HistoryRepository, PinVersion, PinVersionSummary};
use super::lock::BoardLocks;
use super::pin::{
    validate_metadata, NewPin, Pin, PinSearch, PinSort, PinType, PinUpdate, ValidatedPinUpdate,
};
use super::pin_repository::{PinFilter, PinRepository};
use super::repository::BoardRepository;
use super::types::Pagination;
use crate::auth::permission::{self, Action};
use crate::config::BoardConfig;
use crate::db::Database;
use crate::{CorkboardError, Result};

/// Service for pin operations with permission checking.
pub struct PinService<'a> {
    db: &'a Database,
    locks: &'a BoardLocks,
    config: &'a BoardConfig,
}

impl<'a> PinService<'a> {
    pub fn new(db: &'a Database, locks: &'a BoardLocks, config: &'a BoardConfig) -> Self {
        Self { db, locks, config }
    }

    fn pins(&self) -> PinRepository<'a> {
        PinRepository::new(self.db.pool())
    }

    /// Check `action` against a board's current map.
    ///
    /// A missing board is `NotFound`.
    async fn authorize_on_board(
        &self,
        caller: Option<&str>,
        board_id: Uuid,
        action: Action,
    ) -> Result<()> {
        let board = BoardRepository::new(self.db.pool())
            .get_by_id(board_id)
            .await?
            .ok_or_else(|| CorkboardError::NotFound(format!("board {board_id}")))?;
        permission::authorize(&board.perms, caller, action)?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Pin> {
        self.pins()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CorkboardError::NotFound(format!("pin {id}")))
    }

    /// Create a pin. Requires `Edit` on the parent board.
    pub async fn create(&self, caller: &str, new_pin: NewPin) -> Result<Pin> {
        let pin_type = PinType::try_from(new_pin.pin_type)?;
        let flags = new_pin.flags.decode()?;
        validate_metadata(&new_pin.metadata)?;

        let _guard = self.locks.write(new_pin.board_id).await?;
        self.authorize_on_board(Some(caller), new_pin.board_id, Action::Edit)
            .await?;

        let now = Utc::now();
        let pin = Pin {
            id: Uuid::new_v4(),
            board_id: new_pin.board_id,
            pin_type,
            content: new_pin.content,
            creator: caller.to_string(),
            flags,
            attachment_paths: new_pin.attachment_paths,
            metadata: new_pin.metadata,
            created: now,
            edited: now,
        };

        let mut conn = self.db.pool().acquire().await?;
        PinRepository::insert(&mut conn, &pin).await?;

        info!(pin_id = %pin.id, board_id = %pin.board_id, user_id = %caller, "Pin created");
        Ok(pin)
    }

    /// Get a pin. Requires read access to the parent board.
    pub async fn get(&self, caller: Option<&str>, id: Uuid) -> Result<Pin> {
        let pin = self.load(id).await?;
        self.authorize_on_board(caller, pin.board_id, Action::Read)
            .await?;
        Ok(pin)
    }

    /// Partially update a pin. Requires `Edit` on the parent board.
    ///
    /// Type, flags and metadata are checked before anything else happens, so
    /// a bad value leaves the pin untouched. The replaced version goes to the
    /// pin's history in the same transaction as the update.
    pub async fn edit(&self, caller: &str, id: Uuid, update: PinUpdate) -> Result<Pin> {
        let update = ValidatedPinUpdate::try_from(update)?;

        let board_id = self.load(id).await?.board_id;
        let _guard = self.locks.write(board_id).await?;
        // Re-read under the lock: the pin or its board may be gone by now.
        let pin = self.load(id).await?;
        self.authorize_on_board(Some(caller), pin.board_id, Action::Edit)
            .await?;

        if update.is_empty() {
            return Ok(pin);
        }

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        let history_id = HistoryRepository::record(&mut *tx, &pin, caller, now).await?;
        PinRepository::update(&mut *tx, id, &update, now).await?;
        tx.commit().await?;

        info!(pin_id = %id, user_id = %caller, history_id, "Pin edited");
        self.load(id).await
    }

    /// Delete a pin. Requires `Edit` on the parent board.
    pub async fn delete(&self, caller: &str, id: Uuid) -> Result<()> {
        let board_id = self.load(id).await?.board_id;
        let _guard = self.locks.write(board_id).await?;
        self.load(id).await?;
        self.authorize_on_board(Some(caller), board_id, Action::Edit)
            .await?;

        let mut conn = self.db.pool().acquire().await?;
        PinRepository::delete(&mut conn, id).await?;

        info!(pin_id = %id, user_id = %caller, "Pin deleted");
        Ok(())
    }

    /// Search pin content, case-insensitively.
    ///
    /// Covers pins on boards the caller can read. With a board filter the
    /// search is limited to that board, which must exist and be readable.
    pub async fn search(
        &self,
        caller: Option<&str>,
        search: &PinSearch,
        page: Pagination,
    ) -> Result<Vec<Pin>> {
        if let Some(board_id) = search.board_id {
            self.authorize_on_board(caller, board_id, Action::Read)
                .await?;
        }

        let filter = PinFilter {
            viewer: caller,
            query: &search.query,
            board_id: search.board_id,
            creator: search.creator.as_deref(),
            favorited_by: None,
            sort_by: search.sort_by,
            sort_down: search.sort_down,
        };
        let pins = self
            .pins()
            .search(&filter, page.offset, self.limit(page))
            .await?;
        debug!(query = %search.query, results = pins.len(), "Pin search");
        Ok(pins)
    }

    fn limit(&self, page: Pagination) -> u32 {
        page.effective_limit(
            self.config.default_search_limit,
            self.config.max_search_limit,
        )
    }

    /// Versions a pin has replaced, newest first. Requires read access to
    /// the parent board.
    pub async fn history_preview(
        &self,
        caller: Option<&str>,
        id: Uuid,
    ) -> Result<Vec<PinVersionSummary>> {
        let pin = self.get(caller, id).await?;
        HistoryRepository::new(self.db.pool()).preview(pin.id).await
    }

    /// One stored version of a pin. Requires read access to the parent board.
    pub async fn history(
        &self,
        caller: Option<&str>,
        id: Uuid,
        history_id: i64,
    ) -> Result<PinVersion> {
        let pin = self.get(caller, id).await?;
        HistoryRepository::new(self.db.pool())
            .get(pin.id, history_id)
            .await?
            .ok_or_else(|| CorkboardError::NotFound(format!("version {history_id} of pin {id}")))
    }

    /// Mark pins as favorites of the caller. Requires read access to every
    /// parent board; nothing is written unless every check passes.
    ///
    /// Returns how many pins were newly added.
    pub async fn add_favorites(&self, caller: &str, ids: &[Uuid]) -> Result<usize> {
        let pins = self.lock_targets(ids).await?;
        let _guards = self.locks.read_many(&board_ids(&pins)).await?;
        let pins = self.check_targets(caller, ids, Action::Read).await?;

        let now = Utc::now();
        let mut added = 0;
        let mut tx = self.db.pool().begin().await?;
        for pin in &pins {
            if FavoriteRepository::add(&mut *tx, caller, pin.id, now).await? {
                added += 1;
            }
        }
        tx.commit().await?;

        info!(user_id = %caller, added, "Favorites added");
        Ok(added)
    }

    /// Unmark pins. Ids that are not favorites, or no longer exist, are
    /// ignored. Returns how many were removed.
    pub async fn remove_favorites(&self, caller: &str, ids: &[Uuid]) -> Result<usize> {
        let mut removed = 0;
        let mut tx = self.db.pool().begin().await?;
        for &id in ids {
            if FavoriteRepository::remove(&mut *tx, caller, id).await? {
                removed += 1;
            }
        }
        tx.commit().await?;

        info!(user_id = %caller, removed, "Favorites removed");
        Ok(removed)
    }

    /// The caller's favorites on boards they can still read.
    pub async fn favorites(
        &self,
        caller: &str,
        sort_by: PinSort,
        sort_down: bool,
        page: Pagination,
    ) -> Result<Vec<Pin>> {
        let filter = PinFilter {
            viewer: Some(caller),
            favorited_by: Some(caller),
            sort_by,
            sort_down,
            ..PinFilter::default()
        };
        self.pins()
            .search(&filter, page.offset, self.limit(page))
            .await
    }

    /// Which of `ids` the caller has favorited, in input order.
    pub async fn check_favorites(&self, caller: &str, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        FavoriteRepository::new(self.db.pool())
            .favorited(caller, ids)
            .await
    }

    /// Add (`add = true`) or remove flags on several pins.
    ///
    /// Requires `Edit` on every parent board; nothing is written unless every
    /// pin exists and every check passes.
    pub async fn bulk_set_flags(
        &self,
        caller: &str,
        ids: &[Uuid],
        flags: FlagsInput,
        add: bool,
    ) -> Result<usize> {
        let flags = flags.decode()?;

        let pins = self.lock_targets(ids).await?;
        let _guards = self.locks.write_many(&board_ids(&pins)).await?;
        let pins = self.check_targets(caller, ids, Action::Edit).await?;

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        for pin in &pins {
            HistoryRepository::record(&mut *tx, pin, caller, now).await?;
            PinRepository::change_flags(&mut *tx, pin.id, flags, add, now).await?;
        }
        tx.commit().await?;

        info!(user_id = %caller, count = pins.len(), flags = %flags, add, "Pin flags changed");
        Ok(pins.len())
    }

    /// Delete several pins. Requires `Edit` on every parent board.
    pub async fn bulk_delete(&self, caller: &str, ids: &[Uuid]) -> Result<usize> {
        let pins = self.lock_targets(ids).await?;
        let _guards = self.locks.write_many(&board_ids(&pins)).await?;
        let pins = self.check_targets(caller, ids, Action::Edit).await?;

        let mut tx = self.db.pool().begin().await?;
        for pin in &pins {
            PinRepository::delete(&mut *tx, pin.id).await?;
        }
        tx.commit().await?;

        info!(user_id = %caller, count = pins.len(), "Pins deleted");
        Ok(pins.len())
    }

    /// Load every pin in `ids`; any missing one is `NotFound`.
    async fn lock_targets(&self, ids: &[Uuid]) -> Result<Vec<Pin>> {
        let mut pins: Vec<Pin> = Vec::with_capacity(ids.len());
        for &id in ids {
            if pins.iter().any(|p| p.id == id) {
                continue;
            }
            pins.push(self.load(id).await?);
        }
        Ok(pins)
    }

    /// Reload the targets under their locks and authorize each parent board.
    async fn check_targets(&self, caller: &str, ids: &[Uuid], action: Action) -> Result<Vec<Pin>> {
        let pins = self.lock_targets(ids).await?;
        for board_id in board_ids(&pins) {
            self.authorize_on_board(Some(caller), board_id, action)
                .await?;
        }
        Ok(pins)
    }
}

fn board_ids(pins: &[Pin]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = pins.iter().map(|p| p.board_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
