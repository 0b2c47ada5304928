//! User model for corkboard.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// A registered account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Login id (unique, immutable).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Password hash (Argon2). Never serialized.
    #[serde(skip)]
    pub password: String,
    /// Profile picture URL, may be empty.
    pub pfp_url: String,
    /// Free-form user settings; always a JSON object.
    pub settings: Value,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Password hash (should be pre-hashed with Argon2).
    pub password: String,
    /// Profile picture URL.
    pub pfp_url: String,
}

impl NewUser {
    /// Create a new user with an empty profile picture.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            password: password_hash.into(),
            pfp_url: String::new(),
        }
    }

    /// Set the profile picture URL.
    pub fn with_pfp_url(mut self, url: impl Into<String>) -> Self {
        self.pfp_url = url.into();
        self
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct UserRow {
    id: String,
    name: String,
    password: String,
    pfp_url: String,
    settings: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    pub(super) fn into_user(self) -> User {
        // Settings are only ever written from a serialized JSON object.
        let settings = serde_json::from_str(&self.settings)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Map::new()));

        User {
            id: self.id,
            name: self.name,
            password: self.password,
            pfp_url: self.pfp_url,
            settings,
            created_at: self.created_at,
        }
    }
}
