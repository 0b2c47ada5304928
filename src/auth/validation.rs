//! Input validation for account registration.

use thiserror::Error;

use crate::auth::permission::PUBLIC_USER_ID;
use crate::CorkboardError;

/// Maximum user id length.
pub const MAX_USER_ID_LENGTH: usize = 64;

/// Maximum display name length.
pub const MAX_NAME_LENGTH: usize = 100;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// User id is empty.
    #[error("user id cannot be empty")]
    UserIdEmpty,

    /// User id is too long.
    #[error("user id must be at most {MAX_USER_ID_LENGTH} characters")]
    UserIdTooLong,

    /// User id contains invalid characters.
    #[error("user id can only contain letters, digits, '_', '.' and '-'")]
    UserIdInvalidChars,

    /// User id is reserved.
    #[error("this user id is reserved")]
    UserIdReserved,

    /// Name is empty.
    #[error("name cannot be empty")]
    NameEmpty,

    /// Name is too long.
    #[error("name must be at most {MAX_NAME_LENGTH} characters")]
    NameTooLong,

    /// Name contains control characters.
    #[error("name contains invalid characters")]
    NameInvalidChars,
}

impl From<ValidationError> for CorkboardError {
    fn from(e: ValidationError) -> Self {
        CorkboardError::InvalidInput(e.to_string())
    }
}

/// Check if a user id is reserved. Case-insensitive.
pub fn is_reserved_user_id(id: &str) -> bool {
    id.eq_ignore_ascii_case(PUBLIC_USER_ID)
}

/// Validate a login id: 1..=64 characters of `[A-Za-z0-9_.-]`, not reserved.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::UserIdEmpty);
    }
    if id.chars().count() > MAX_USER_ID_LENGTH {
        return Err(ValidationError::UserIdTooLong);
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ValidationError::UserIdInvalidChars);
    }
    if is_reserved_user_id(id) {
        return Err(ValidationError::UserIdReserved);
    }
    Ok(())
}

/// Validate a display name.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::NameEmpty);
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong);
    }
    if name.chars().any(char::is_control) {
        return Err(ValidationError::NameInvalidChars);
    }
    Ok(())
}
