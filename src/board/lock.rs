//! Per-board critical sections.
//!
//! Every mutation of a board, its permission map or its pins runs under that
//! board's write lock, so read-modify-write sequences never interleave.
//! Reads take the shared side.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::{CorkboardError, Result};

pub type BoardWriteGuard = OwnedRwLockWriteGuard<()>;
pub type BoardReadGuard = OwnedRwLockReadGuard<()>;

/// Registry of per-board locks.
#[derive(Debug)]
pub struct BoardLocks {
    locks: Mutex<HashMap<Uuid, Arc<RwLock<()>>>>,
    timeout: Duration,
}

impl BoardLocks {
    /// Create a registry whose acquisitions give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Look up or register the lock for a board.
    ///
    /// Registering a new id first drops entries nobody holds or waits on, so
    /// lookups of ids that turn out not to exist leave nothing behind.
    fn lock_for(&self, id: Uuid) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(&id) {
            return lock.clone();
        }
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(id).or_default().clone()
    }

    fn timed_out(&self, id: Uuid) -> CorkboardError {
        warn!(board_id = %id, timeout_ms = self.timeout.as_millis() as u64, "Board lock timed out");
        CorkboardError::Conflict(format!("board {id} is busy, try again"))
    }

    /// Take the exclusive lock for a board.
    pub async fn write(&self, id: Uuid) -> Result<BoardWriteGuard> {
        let lock = self.lock_for(id);
        tokio::time::timeout(self.timeout, lock.write_owned())
            .await
            .map_err(|_| self.timed_out(id))
    }

    /// Take the shared lock for a board.
    pub async fn read(&self, id: Uuid) -> Result<BoardReadGuard> {
        let lock = self.lock_for(id);
        tokio::time::timeout(self.timeout, lock.read_owned())
            .await
            .map_err(|_| self.timed_out(id))
    }

    /// Take the exclusive locks for several boards.
    ///
    /// Ids are locked in sorted order with duplicates removed, so two bulk
    /// operations over overlapping sets cannot deadlock.
    pub async fn write_many(&self, ids: &[Uuid]) -> Result<Vec<BoardWriteGuard>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.write(id).await?);
        }
        Ok(guards)
    }

    /// Take the shared locks for several boards, in the same order as
    /// [`write_many`](Self::write_many).
    pub async fn read_many(&self, ids: &[Uuid]) -> Result<Vec<BoardReadGuard>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.read(id).await?);
        }
        Ok(guards)
    }

    /// Drop the registry entry of a deleted board.
    pub fn forget(&self, id: Uuid) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Number of boards with a registered lock.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
