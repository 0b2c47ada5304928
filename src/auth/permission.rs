//! Board permission model for corkboard.
//!
//! Every board carries an access-control list mapping user ids to a
//! [`PermLevel`]. This module resolves a caller's effective level, decides
//! whether an [`Action`] is allowed, and merges edits into the list.
//!
//! The merge rules are pure functions over maps so they can be exercised
//! without storage:
//!
//! - omission is not deletion: users absent from an incoming map keep their entry
//! - the board creator always holds `Owner`
//! - an `Owner` cannot demote themselves through an edit
//! - the reserved [`PUBLIC_USER_ID`] entry grants read access to everyone

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CorkboardError;

/// Reserved user id whose entry makes a board readable by every caller,
/// including anonymous ones.
pub const PUBLIC_USER_ID: &str = "public";

/// Permission level on a board. Ordered `View < Edit < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PermLevel {
    /// Read-only access.
    View,
    /// Read and write board content and pins.
    Edit,
    /// Full control, including deleting the board and managing permissions.
    Owner,
}

impl PermLevel {
    /// Wire name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermLevel::View => "View",
            PermLevel::Edit => "Edit",
            PermLevel::Owner => "Owner",
        }
    }

    /// Check if this level is at least `required`.
    pub fn can_access(&self, required: PermLevel) -> bool {
        *self >= required
    }
}

impl fmt::Display for PermLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermLevel {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" => Ok(PermLevel::View),
            "edit" => Ok(PermLevel::Edit),
            "owner" => Ok(PermLevel::Owner),
            _ => Err(PermissionError::InvalidPermissionLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for PermLevel {
    type Error = PermissionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PermLevel> for String {
    fn from(level: PermLevel) -> Self {
        level.as_str().to_string()
    }
}

/// A single access-control entry, as carried on the wire: `{"perm_level": "Owner"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perm {
    pub perm_level: PermLevel,
}

impl Perm {
    pub fn new(perm_level: PermLevel) -> Self {
        Self { perm_level }
    }
}

impl From<PermLevel> for Perm {
    fn from(perm_level: PermLevel) -> Self {
        Self { perm_level }
    }
}

/// A board's access-control list, keyed by user id.
pub type PermMap = BTreeMap<String, Perm>;

/// Operations gated by the permission model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Edit,
    Delete,
    ManagePerms,
}

impl Action {
    /// Minimum level required for this action.
    pub fn required_level(&self) -> PermLevel {
        match self {
            Action::Read => PermLevel::View,
            Action::Edit => PermLevel::Edit,
            Action::Delete | Action::ManagePerms => PermLevel::Owner,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::ManagePerms => "manage permissions",
        }
    }
}

/// Permission-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// Caller's level is below what the action needs.
    #[error("{action} requires {required} permission")]
    Insufficient {
        action: &'static str,
        required: PermLevel,
    },

    /// Anonymous caller attempted a mutation.
    #[error("this operation requires login")]
    NotAuthenticated,

    /// Unrecognized level name.
    #[error("invalid permission level: {0}")]
    InvalidPermissionLevel(String),

    /// The public entry may only grant View.
    #[error("the public entry can only grant View, not {0}")]
    PublicAboveView(PermLevel),
}

impl From<PermissionError> for CorkboardError {
    fn from(e: PermissionError) -> Self {
        match e {
            PermissionError::Insufficient { .. } => CorkboardError::NotAuthorized(e.to_string()),
            PermissionError::NotAuthenticated => CorkboardError::NotAuthenticated,
            PermissionError::InvalidPermissionLevel(_) | PermissionError::PublicAboveView(_) => {
                CorkboardError::InvalidInput(e.to_string())
            }
        }
    }
}

/// Resolve a caller's effective level on a board.
///
/// The highest of the caller's own entry and the board's public entry wins;
/// the public entry never grants more than `View`. `None` as the caller means
/// an anonymous request.
///
/// # Examples
///
/// ```
/// use corkboard::auth::permission::{resolve, Perm, PermLevel, PermMap};
///
/// let mut perms = PermMap::new();
/// perms.insert("alice".to_string(), Perm::new(PermLevel::Owner));
///
/// assert_eq!(resolve(&perms, Some("alice")), Some(PermLevel::Owner));
/// assert_eq!(resolve(&perms, Some("bob")), None);
/// assert_eq!(resolve(&perms, None), None);
/// ```
pub fn resolve(perms: &PermMap, user_id: Option<&str>) -> Option<PermLevel> {
    let own = user_id
        .and_then(|id| perms.get(id))
        .map(|p| p.perm_level);
    let public = perms.get(PUBLIC_USER_ID).map(|_| PermLevel::View);
    own.max(public)
}

/// Check whether a caller may perform `action` on a board with `perms`.
///
/// Returns the caller's resolved level on success. Anonymous callers are
/// only ever allowed to read.
pub fn authorize(
    perms: &PermMap,
    user_id: Option<&str>,
    action: Action,
) -> Result<PermLevel, PermissionError> {
    if user_id.is_none() && action != Action::Read {
        return Err(PermissionError::NotAuthenticated);
    }

    let required = action.required_level();
    match resolve(perms, user_id) {
        Some(level) if level.can_access(required) => Ok(level),
        _ => Err(PermissionError::Insufficient {
            action: action.as_str(),
            required,
        }),
    }
}

/// Validate an incoming map before it is applied.
///
/// Levels are already typed; this checks the rules that depend on the key.
/// Unknown user ids are checked by the caller against storage.
pub fn validate_incoming(incoming: &PermMap) -> Result<(), PermissionError> {
    if let Some(public) = incoming.get(PUBLIC_USER_ID) {
        if public.perm_level != PermLevel::View {
            return Err(PermissionError::PublicAboveView(public.perm_level));
        }
    }
    Ok(())
}

/// Result of merging an edit into a permission map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermEdit {
    /// The map to persist.
    pub perms: PermMap,
    /// Users whose entry was put back because the edit would have demoted or
    /// removed a protected owner.
    pub restored: Vec<String>,
}

impl PermEdit {
    /// Whether the result differs from `existing`.
    pub fn changes(&self, existing: &PermMap) -> bool {
        &self.perms != existing
    }
}

/// Build the initial map for a new board: the incoming entries plus an
/// unconditional `Owner` entry for the creator.
pub fn initial_perms(creator: &str, incoming: &PermMap) -> PermMap {
    let mut perms = incoming.clone();
    perms.insert(creator.to_string(), Perm::new(PermLevel::Owner));
    perms
}

/// Merge `incoming` into `existing` on behalf of `caller`.
///
/// Incoming entries overwrite existing ones per user id; users not named in
/// `incoming` keep their entry, so an empty map is a no-op. Afterwards two
/// entries are protected:
///
/// - the creator always ends up as `Owner`
/// - if the caller was an `Owner`, their own entry cannot drop below `Owner`
///
/// An owner may still downgrade a different, non-creator owner explicitly.
///
/// # Examples
///
/// ```
/// use corkboard::auth::permission::{apply_edit, Perm, PermLevel, PermMap};
///
/// let mut existing = PermMap::new();
/// existing.insert("alice".to_string(), Perm::new(PermLevel::Owner));
///
/// let edit = apply_edit(&existing, "alice", "alice", &PermMap::new());
/// assert_eq!(edit.perms, existing);
/// ```
pub fn apply_edit(existing: &PermMap, creator: &str, caller: &str, incoming: &PermMap) -> PermEdit {
    let mut perms = existing.clone();
    for (user_id, perm) in incoming {
        perms.insert(user_id.clone(), *perm);
    }

    let restored = protect_owners(existing, &mut perms, creator, caller);
    PermEdit { perms, restored }
}

/// Remove the entries for `revokes` from `existing` on behalf of `caller`.
///
/// The creator's entry and an owner caller's own entry survive revocation.
pub fn apply_revoke(existing: &PermMap, creator: &str, caller: &str, revokes: &[String]) -> PermEdit {
    let mut perms = existing.clone();
    for user_id in revokes {
        perms.remove(user_id);
    }

    let restored = protect_owners(existing, &mut perms, creator, caller);
    PermEdit { perms, restored }
}

fn protect_owners(
    existing: &PermMap,
    perms: &mut PermMap,
    creator: &str,
    caller: &str,
) -> Vec<String> {
    let mut restored = Vec::new();

    let owner = Perm::new(PermLevel::Owner);
    if perms.get(creator) != Some(&owner) {
        perms.insert(creator.to_string(), owner);
        if existing.get(creator).is_some() {
            restored.push(creator.to_string());
        }
    }

    if caller != creator && existing.get(caller) == Some(&owner) && perms.get(caller) != Some(&owner)
    {
        perms.insert(caller.to_string(), owner);
        restored.push(caller.to_string());
    }

    restored
}
