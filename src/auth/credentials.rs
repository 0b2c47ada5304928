//! Credential verification.

use async_trait::async_trait;
use tracing::debug;

use crate::auth::password::verify_password;
use crate::db::{Database, UserRepository};
use crate::Result;

/// Checks a username/password pair and yields the user id on success.
///
/// `Ok(None)` means the credentials did not match. `Err` is reserved for
/// failures of the backing store.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Result<Option<String>>;
}

/// Verifies credentials against the users table.
#[derive(Debug, Clone)]
pub struct DatabaseCredentials {
    db: Database,
}

impl DatabaseCredentials {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialVerifier for DatabaseCredentials {
    async fn verify(&self, username: &str, password: &str) -> Result<Option<String>> {
        let repo = UserRepository::new(self.db.pool());
        let Some(user) = repo.get_by_id(username).await? else {
            debug!(username = %username, "Credential check: unknown user");
            return Ok(None);
        };

        match verify_password(password, &user.password) {
            Ok(()) => Ok(Some(user.id)),
            Err(e) => {
                debug!(username = %username, error = %e, "Credential check failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::db::NewUser;

    #[tokio::test]
    async fn test_verify_against_database() {
        let db = Database::open_in_memory().await.unwrap();
        let hash = hash_password("correct horse battery").unwrap();
        UserRepository::new(db.pool())
            .create(&NewUser::new("alice", "Alice", hash))
            .await
            .unwrap();

        let creds = DatabaseCredentials::new(db);
        assert_eq!(
            creds.verify("alice", "correct horse battery").await.unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(creds.verify("alice", "wrong horse battery").await.unwrap(), None);
        assert_eq!(creds.verify("bob", "correct horse battery").await.unwrap(), None);
    }
}
