//! Test helpers for integration tests.
//!
//! Builds an `App` over an in-memory database and seeds accounts.

#![allow(dead_code)]

use corkboard::auth::{register, RegistrationRequest};
use corkboard::db::{NewUser, UserRepository};
use corkboard::{App, Config, Database, Perm, PermLevel, PermMap};

/// Password used by `register_user`.
pub const TEST_PASSWORD: &str = "correct horse battery";

/// Create an app backed by a fresh in-memory database.
pub async fn test_app() -> App {
    let db = Database::open_in_memory().await.unwrap();
    App::with_database(db, Config::default())
}

/// Create accounts that never log in. Skips password hashing.
pub async fn add_users(app: &App, ids: &[&str]) {
    let repo = UserRepository::new(app.db().pool());
    for id in ids {
        repo.create(&NewUser::new(*id, *id, "unused-hash"))
            .await
            .unwrap();
    }
}

/// Register an account with `TEST_PASSWORD`.
pub async fn register_user(app: &App, id: &str) {
    register(app.db(), RegistrationRequest::new(id, id, TEST_PASSWORD))
        .await
        .unwrap();
}

/// Build a permission map from `(user, level)` pairs.
pub fn perms(entries: &[(&str, PermLevel)]) -> PermMap {
    entries
        .iter()
        .map(|(id, level)| (id.to_string(), Perm::new(*level)))
        .collect()
}
