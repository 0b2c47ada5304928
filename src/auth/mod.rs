//! Authentication module for corkboard.
//!
//! Password hashing, account registration and profiles, credential
//! verification, cookie sessions, and the board permission model.

mod credentials;
mod password;
pub mod permission;
mod profile;
mod registration;
mod session;
pub mod validation;

pub use credentials::{CredentialVerifier, DatabaseCredentials};
pub use password::{hash_password, validate_password, verify_password, PasswordError};
pub use permission::{
    Action, Perm, PermEdit, PermLevel, PermMap, PermissionError, PUBLIC_USER_ID,
};
pub use profile::{change_settings, delete_account, get_user, merge_json, search_users};
pub use registration::{register, RegistrationRequest};
pub use session::{Session, SessionCookie, SessionError, SessionStore};
pub use validation::ValidationError;
