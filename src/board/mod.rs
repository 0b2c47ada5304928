//! Board module for corkboard.
//!
//! This module provides boards and the pins on them:
//! - Board management with per-board access-control lists
//! - Pins with typed content, state flags and edit history
//! - Ranked search scoped to what the caller may read
//! - Per-user favorites and board tags
//! - Per-board locking for read-modify-write operations

mod favorites;
pub mod flags;
mod history;
mod lock;
mod pin;
mod pin_repository;
mod pin_service;
mod repository;
mod service;
mod tag;
mod tag_repository;
mod tag_service;
mod types;

pub use favorites::FavoriteRepository;
pub use flags::{decode, encode, FlagError, FlagsInput, PinFlag, PinFlags};
pub use history::{HistoryRepository, PinVersion, PinVersionSummary};
pub use lock::{BoardLocks, BoardReadGuard, BoardWriteGuard};
pub use pin::{
    validate_metadata, NewPin, Pin, PinSearch, PinSort, PinType, PinUpdate, ValidatedPinUpdate,
};
pub use pin_repository::{PinFilter, PinRepository};
pub use pin_service::PinService;
pub use repository::{BoardFields, BoardRepository};
pub use service::{caller_level, BoardService};
pub use tag::{validate_tag_name, NewTag, Tag, TagUpdate, MAX_TAG_NAME_LENGTH};
pub use tag_repository::TagRepository;
pub use tag_service::TagService;
pub use types::{
    validate_board_name, validate_color, Board, BoardUpdate, NewBoard, Pagination,
    MAX_BOARD_NAME_LENGTH,
};
