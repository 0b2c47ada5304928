//! Pin model for corkboard.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::flags::{FlagsInput, PinFlags};
use crate::CorkboardError;

/// Kind of content a pin holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PinType {
    Markdown = 0,
    ImageGallery = 1,
    Link = 2,
    Review = 3,
}

impl PinType {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PinType::Markdown => "markdown",
            PinType::ImageGallery => "image_gallery",
            PinType::Link => "link",
            PinType::Review => "review",
        }
    }
}

impl TryFrom<i64> for PinType {
    type Error = CorkboardError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PinType::Markdown),
            1 => Ok(PinType::ImageGallery),
            2 => Ok(PinType::Link),
            3 => Ok(PinType::Review),
            _ => Err(CorkboardError::InvalidInput(format!(
                "unknown pin type: {value}"
            ))),
        }
    }
}

impl From<PinType> for i64 {
    fn from(pin_type: PinType) -> Self {
        pin_type.as_i64()
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content item on a board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pin {
    pub id: Uuid,
    /// Parent board. Never changes after creation.
    pub board_id: Uuid,
    pub pin_type: PinType,
    pub content: String,
    pub creator: String,
    /// Serialized as text, e.g. `"LOCKED | ARCHIVED"`.
    pub flags: PinFlags,
    pub attachment_paths: Vec<String>,
    pub metadata: Value,
    pub created: DateTime<Utc>,
    pub edited: DateTime<Utc>,
}

/// Data for creating a pin. Type and flags arrive raw and are validated by
/// the pin service before anything is written.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPin {
    pub board_id: Uuid,
    pub pin_type: i64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub flags: FlagsInput,
    #[serde(default)]
    pub attachment_paths: Vec<String>,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
}

fn empty_metadata() -> Value {
    Value::Object(Map::new())
}

/// Pin metadata must be a JSON object.
pub fn validate_metadata(metadata: &Value) -> Result<(), CorkboardError> {
    if metadata.is_object() {
        Ok(())
    } else {
        Err(CorkboardError::InvalidInput(
            "pin metadata must be a JSON object".to_string(),
        ))
    }
}

impl NewPin {
    pub fn new(board_id: Uuid, pin_type: i64, content: impl Into<String>) -> Self {
        Self {
            board_id,
            pin_type,
            content: content.into(),
            flags: FlagsInput::default(),
            attachment_paths: Vec::new(),
            metadata: empty_metadata(),
        }
    }

    pub fn with_flags(mut self, flags: impl Into<FlagsInput>) -> Self {
        self.flags = flags.into();
        self
    }

    pub fn with_attachments(mut self, paths: Vec<String>) -> Self {
        self.attachment_paths = paths;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Partial update of a pin. The parent board cannot be changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PinUpdate {
    pub pin_type: Option<i64>,
    pub content: Option<String>,
    pub flags: Option<FlagsInput>,
    pub attachment_paths: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

impl PinUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin_type(mut self, pin_type: i64) -> Self {
        self.pin_type = Some(pin_type);
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn flags(mut self, flags: impl Into<FlagsInput>) -> Self {
        self.flags = Some(flags.into());
        self
    }

    pub fn attachment_paths(mut self, paths: Vec<String>) -> Self {
        self.attachment_paths = Some(paths);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A [`PinUpdate`] whose type and flags have been decoded.
#[derive(Debug, Clone, Default)]
pub struct ValidatedPinUpdate {
    pub pin_type: Option<PinType>,
    pub content: Option<String>,
    pub flags: Option<PinFlags>,
    pub attachment_paths: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

impl ValidatedPinUpdate {
    pub fn is_empty(&self) -> bool {
        self.pin_type.is_none()
            && self.content.is_none()
            && self.flags.is_none()
            && self.attachment_paths.is_none()
            && self.metadata.is_none()
    }
}

impl TryFrom<PinUpdate> for ValidatedPinUpdate {
    type Error = CorkboardError;

    fn try_from(update: PinUpdate) -> Result<Self, Self::Error> {
        if let Some(metadata) = &update.metadata {
            validate_metadata(metadata)?;
        }
        Ok(Self {
            pin_type: update.pin_type.map(PinType::try_from).transpose()?,
            flags: update.flags.as_ref().map(FlagsInput::decode).transpose()?,
            content: update.content,
            attachment_paths: update.attachment_paths,
            metadata: update.metadata,
        })
    }
}

/// Ordering of pin search and favorite listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinSort {
    /// Earliest match position in the content first, then newest.
    /// Ignores the sort direction.
    #[default]
    Relevance,
    Created,
    Edited,
}

/// Pin search criteria.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PinSearch {
    /// Case-insensitive substring of the content. Empty matches every pin.
    #[serde(default)]
    pub query: String,
    pub board_id: Option<Uuid>,
    pub creator: Option<String>,
    #[serde(default)]
    pub sort_by: PinSort,
    #[serde(default = "sort_down_default")]
    pub sort_down: bool,
}

fn sort_down_default() -> bool {
    true
}

impl Default for PinSearch {
    fn default() -> Self {
        Self {
            query: String::new(),
            board_id: None,
            creator: None,
            sort_by: PinSort::default(),
            sort_down: sort_down_default(),
        }
    }
}

impl PinSearch {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn board(mut self, board_id: Uuid) -> Self {
        self.board_id = Some(board_id);
        self
    }

    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn sort(mut self, sort_by: PinSort, sort_down: bool) -> Self {
        self.sort_by = sort_by;
        self.sort_down = sort_down;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pin_type_conversion() {
        assert_eq!(PinType::try_from(0).unwrap(), PinType::Markdown);
        assert_eq!(PinType::try_from(3).unwrap(), PinType::Review);
        assert!(matches!(
            PinType::try_from(4),
            Err(CorkboardError::InvalidInput(_))
        ));
        assert!(PinType::try_from(-1).is_err());
        assert_eq!(i64::from(PinType::Link), 2);
    }

    #[test]
    fn test_pin_type_serde() {
        assert_eq!(serde_json::to_string(&PinType::ImageGallery).unwrap(), "1");
        assert!(serde_json::from_str::<PinType>("9").is_err());
    }

    #[test]
    fn test_new_pin_deserialize_defaults() {
        let board_id = Uuid::new_v4();
        let pin: NewPin =
            serde_json::from_value(json!({"board_id": board_id, "pin_type": 0})).unwrap();
        assert_eq!(pin.flags, FlagsInput::Bits(0));
        assert!(pin.attachment_paths.is_empty());
        assert_eq!(pin.content, "");
        assert_eq!(pin.metadata, json!({}));
        assert_eq!(NewPin::new(board_id, 0, "x").metadata, json!({}));
    }

    #[test]
    fn test_metadata_must_be_object() {
        assert!(validate_metadata(&json!({"stars": 4})).is_ok());
        for bad in [json!(null), json!([1, 2]), json!("text"), json!(3)] {
            assert!(matches!(
                validate_metadata(&bad),
                Err(CorkboardError::InvalidInput(_))
            ));
        }
        assert!(ValidatedPinUpdate::try_from(PinUpdate::new().metadata(json!([]))).is_err());
    }

    #[test]
    fn test_pin_search_deserialize_defaults() {
        let search: PinSearch = serde_json::from_value(json!({"query": "milk"})).unwrap();
        assert_eq!(search, PinSearch::new("milk"));
        assert_eq!(search.sort_by, PinSort::Relevance);
        assert!(search.sort_down);

        let search: PinSearch =
            serde_json::from_value(json!({"sort_by": "edited", "sort_down": false, "creator": "bob"}))
                .unwrap();
        assert_eq!(search.sort_by, PinSort::Edited);
        assert!(!search.sort_down);
        assert_eq!(search.creator.as_deref(), Some("bob"));
    }

    #[test]
    fn test_validated_update() {
        let update = PinUpdate::new().flags("LOCKED | ARCHIVED").pin_type(2);
        let validated = ValidatedPinUpdate::try_from(update).unwrap();
        assert_eq!(validated.flags.unwrap().bits(), 3);
        assert_eq!(validated.pin_type, Some(PinType::Link));

        assert!(ValidatedPinUpdate::try_from(PinUpdate::new().flags("HOT")).is_err());
        assert!(ValidatedPinUpdate::try_from(PinUpdate::new().pin_type(12)).is_err());
        assert!(ValidatedPinUpdate::try_from(PinUpdate::new())
            .unwrap()
            .is_empty());
    }
}
