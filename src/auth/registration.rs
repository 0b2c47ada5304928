//! Account registration for corkboard.

use tracing::info;

use crate::auth::password::hash_password;
use crate::auth::validation::{validate_name, validate_user_id};
use crate::db::{Database, NewUser, User, UserRepository};
use crate::Result;

/// Registration request data.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Login id, also the user's stable identity.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Plaintext password (10-128 characters).
    pub password: String,
    pub pfp_url: Option<String>,
}

impl RegistrationRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            password: password.into(),
            pfp_url: None,
        }
    }

    pub fn with_pfp_url(mut self, url: impl Into<String>) -> Self {
        self.pfp_url = Some(url.into());
        self
    }
}

/// Register a new account.
///
/// Validates every field before touching the database. A taken id fails
/// with `Conflict`; the reserved id `public` fails with `InvalidInput`.
pub async fn register(db: &Database, request: RegistrationRequest) -> Result<User> {
    validate_user_id(&request.id)?;
    validate_name(&request.name)?;
    let password_hash = hash_password(&request.password)?;

    let mut new_user = NewUser::new(&request.id, &request.name, password_hash);
    if let Some(url) = request.pfp_url {
        new_user = new_user.with_pfp_url(url);
    }

    let user = UserRepository::new(db.pool()).create(&new_user).await?;
    info!(user_id = %user.id, "New user registered");
    Ok(user)
}
