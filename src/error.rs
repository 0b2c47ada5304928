//! Error types for corkboard.

use thiserror::Error;

/// Stable classification of [`CorkboardError`] for transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UnknownUser,
    NotAuthenticated,
    NotAuthorized,
    NotFound,
    Conflict,
    Internal,
}

/// Common error type for corkboard.
#[derive(Error, Debug)]
pub enum CorkboardError {
    /// Malformed caller input: bad color, flag name, permission level, pin type.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced user id does not resolve to a known user.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// No session, or the session is unknown or expired.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Authenticated, but the permission level is insufficient.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Concurrent mutation on a serialized entity, or a duplicate key.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database error.
    ///
    /// Errors from sqlx are converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CorkboardError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CorkboardError::InvalidInput(_) => ErrorKind::InvalidInput,
            CorkboardError::UnknownUser(_) => ErrorKind::UnknownUser,
            CorkboardError::NotAuthenticated => ErrorKind::NotAuthenticated,
            CorkboardError::NotAuthorized(_) => ErrorKind::NotAuthorized,
            CorkboardError::NotFound(_) => ErrorKind::NotFound,
            CorkboardError::Conflict(_) => ErrorKind::Conflict,
            CorkboardError::Database(_) | CorkboardError::Io(_) | CorkboardError::Config(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the caller can fix this by changing input, credentials or retrying.
    pub fn is_client_error(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }
}

impl From<sqlx::Error> for CorkboardError {
    fn from(e: sqlx::Error) -> Self {
        CorkboardError::Database(e.to_string())
    }
}

/// Result type alias for corkboard operations.
pub type Result<T> = std::result::Result<T, CorkboardError>;
