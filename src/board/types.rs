//! Board model for corkboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::PermMap;
use crate::{CorkboardError, Result};

/// Maximum board name length in characters (exclusive).
pub const MAX_BOARD_NAME_LENGTH: usize = 4096;

/// Board entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Board {
    pub id: Uuid,
    pub name: String,
    pub desc: String,
    /// User who created the board; always holds `Owner`.
    pub creator: String,
    /// `#RRGGBB`.
    pub color: String,
    pub created: DateTime<Utc>,
    pub edited: DateTime<Utc>,
    pub perms: PermMap,
    /// Number of pins on the board at load time.
    pub pin_count: i64,
}

/// Data for creating a new board.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBoard {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub color: String,
    /// Extra entries; the creator is added as `Owner` regardless.
    #[serde(default)]
    pub perms: PermMap,
}

impl NewBoard {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: String::new(),
            color: color.into(),
            perms: PermMap::new(),
        }
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn with_perms(mut self, perms: PermMap) -> Self {
        self.perms = perms;
        self
    }
}

/// Partial update of a board. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardUpdate {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub color: Option<String>,
    /// Entries to merge into the existing map. Omitted users keep their entry.
    pub perms: Option<PermMap>,
}

impl BoardUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn perms(mut self, perms: PermMap) -> Self {
        self.perms = Some(perms);
        self
    }

    /// Validate every field that is present.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_board_name(name)?;
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }
}

/// Check that `color` is a `#RRGGBB` hex color.
pub fn validate_color(color: &str) -> Result<()> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if valid {
        Ok(())
    } else {
        Err(CorkboardError::InvalidInput(format!(
            "'{color}' is not a color of the form #RRGGBB"
        )))
    }
}

/// Check a board name: non-blank and shorter than 4096 characters.
pub fn validate_board_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CorkboardError::InvalidInput(
            "board name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() >= MAX_BOARD_NAME_LENGTH {
        return Err(CorkboardError::InvalidInput(format!(
            "board name must be shorter than {MAX_BOARD_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Pagination parameters for searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    /// Number of items to skip.
    #[serde(default)]
    pub offset: u32,
    /// Maximum number of items to return; `None` uses the configured default.
    pub limit: Option<u32>,
}

impl Pagination {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// First page with the given limit.
    pub fn first(limit: u32) -> Self {
        Self::new(0, limit)
    }

    /// Resolve the effective limit: `default` when unset, clamped to `1..=max`.
    pub fn effective_limit(&self, default: u32, max: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, max.max(1))
    }
}
