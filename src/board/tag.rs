//! Board tags: private, per-user groupings of boards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::validate_color;
use crate::{CorkboardError, Result};

/// Maximum tag name length in characters (exclusive).
pub const MAX_TAG_NAME_LENGTH: usize = 256;

/// A tag and the boards filed under it. Only its owner ever sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub color: String,
    pub created: DateTime<Utc>,
    pub board_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub board_ids: Vec<Uuid>,
}

impl NewTag {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            board_ids: Vec::new(),
        }
    }

    pub fn with_boards(mut self, board_ids: Vec<Uuid>) -> Self {
        self.board_ids = board_ids;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_tag_name(&self.name)?;
        validate_color(&self.color)
    }
}

/// Partial update of a tag. `board_ids` replaces the whole board list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub board_ids: Option<Vec<Uuid>>,
}

impl TagUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn board_ids(mut self, board_ids: Vec<Uuid>) -> Self {
        self.board_ids = Some(board_ids);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_tag_name(name)?;
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }
}

pub fn validate_tag_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CorkboardError::InvalidInput(
            "tag name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() >= MAX_TAG_NAME_LENGTH {
        return Err(CorkboardError::InvalidInput(format!(
            "tag name must be shorter than {MAX_TAG_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}
