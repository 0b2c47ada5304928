//! User profile management for corkboard.

use serde_json::Value;
use tracing::info;

use crate::auth::session::SessionStore;
use crate::board::{BoardLocks, BoardRepository};
use crate::db::{Database, User, UserRepository};
use crate::{CorkboardError, Result};

/// Minimum filter length for user search.
pub const MIN_SEARCH_FILTER_LENGTH: usize = 2;

/// Maximum results returned by user search.
pub const MAX_SEARCH_RESULTS: i64 = 20;

/// Attempts at locking a stable set of boards before an account delete gives up.
const DELETE_LOCK_ROUNDS: usize = 3;

/// Get a user by id.
pub async fn get_user(db: &Database, id: &str) -> Result<User> {
    UserRepository::new(db.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| CorkboardError::NotFound(format!("user '{id}'")))
}

/// Merge `patch` into a user's settings and return the updated user.
///
/// Objects merge key by key, recursively; any other value replaces what was
/// there. The patch itself must be an object.
pub async fn change_settings(db: &Database, id: &str, patch: &Value) -> Result<User> {
    if !patch.is_object() {
        return Err(CorkboardError::InvalidInput(
            "settings patch must be a JSON object".to_string(),
        ));
    }

    let repo = UserRepository::new(db.pool());
    let user = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| CorkboardError::NotFound(format!("user '{id}'")))?;

    let mut settings = user.settings;
    merge_json(&mut settings, patch);

    let updated = repo
        .update_settings(id, &settings)
        .await?
        .ok_or_else(|| CorkboardError::NotFound(format!("user '{id}'")))?;
    info!(user_id = %id, "User settings updated");
    Ok(updated)
}

/// Recursively merge `patch` into `target`.
pub fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Case-insensitive substring search over user ids and names.
pub async fn search_users(db: &Database, filter: &str) -> Result<Vec<User>> {
    let filter = filter.trim();
    if filter.chars().count() < MIN_SEARCH_FILTER_LENGTH {
        return Err(CorkboardError::InvalidInput(format!(
            "search filter must be at least {MIN_SEARCH_FILTER_LENGTH} characters"
        )));
    }
    UserRepository::new(db.pool())
        .search(filter, MAX_SEARCH_RESULTS)
        .await
}

/// Delete an account and log out all of its sessions.
///
/// Boards the user created are deleted with their pins, and the user's
/// entries on other boards are removed. Every board touched is write-locked
/// for the delete, so no concurrent board mutation can write an entry for
/// the user back. Boards that start naming the user while the locks are
/// being taken are picked up by another round.
pub async fn delete_account(
    db: &Database,
    sessions: &SessionStore,
    locks: &BoardLocks,
    id: &str,
) -> Result<()> {
    if !UserRepository::new(db.pool()).exists(id).await? {
        return Err(CorkboardError::NotFound(format!("user '{id}'")));
    }

    let boards = BoardRepository::new(db.pool());
    let mut touched = boards.ids_touching_user(id).await?;

    for _ in 0..DELETE_LOCK_ROUNDS {
        let guards = locks.write_many(&touched).await?;
        let current = boards.ids_touching_user(id).await?;
        if current.iter().any(|board| !touched.contains(board)) {
            drop(guards);
            touched = current;
            continue;
        }

        let deleted = UserRepository::new(db.pool()).delete(id).await?;
        drop(guards);
        if !deleted {
            return Err(CorkboardError::NotFound(format!("user '{id}'")));
        }
        for board in current {
            locks.forget(board);
        }

        let logged_out = sessions.logout_user(id);
        info!(user_id = %id, sessions = logged_out, "Account deleted");
        return Ok(());
    }

    Err(CorkboardError::Conflict(format!(
        "boards of user '{id}' keep changing, try again"
    )))
}
