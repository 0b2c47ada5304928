//! corkboard - collaborative boards and pins
//!
//! Boards carry an access-control list of `Owner`/`Edit`/`View` entries;
//! pins live on a board and inherit its permissions. Identity comes from a
//! cookie-backed session store.

pub mod app;
pub mod auth;
pub mod board;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use app::App;
pub use auth::{
    hash_password, register, validate_password, verify_password, Action, CredentialVerifier,
    DatabaseCredentials, PasswordError, Perm, PermLevel, PermMap, PermissionError,
    RegistrationRequest, Session, SessionCookie, SessionError, SessionStore, ValidationError,
    PUBLIC_USER_ID,
};
pub use board::{
    Board, BoardService, BoardUpdate, FlagsInput, NewBoard, NewPin, NewTag, Pagination, Pin,
    PinFlag, PinFlags, PinSearch, PinService, PinSort, PinType, PinUpdate, PinVersion, Tag,
    TagService, TagUpdate,
};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{CorkboardError, ErrorKind, Result};
