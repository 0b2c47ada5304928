//! Cookie-backed session store for corkboard.
//!
//! A session binds an opaque token to an authenticated user id. Tokens are
//! handed to clients through a cookie; the store itself knows nothing about
//! HTTP beyond describing the cookie to set.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::credentials::CredentialVerifier;
use crate::config::SessionConfig;
use crate::{CorkboardError, Result};

/// Session-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Wrong username or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No token was presented.
    #[error("no session token")]
    MissingToken,

    /// Token does not name a live session.
    #[error("session not found")]
    SessionNotFound,

    /// Session outlived its time-to-live.
    #[error("session expired")]
    SessionExpired,
}

impl From<SessionError> for CorkboardError {
    fn from(_: SessionError) -> Self {
        CorkboardError::NotAuthenticated
    }
}

/// A logged-in session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque token (UUID v4, simple form).
    pub token: String,
    /// The authenticated user.
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// `None` means valid until logout.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    fn new(user_id: String, ttl: Option<Duration>) -> Self {
        let now = Utc::now();
        let expires_at = ttl
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now + d);

        Self {
            token: Uuid::new_v4().simple().to_string(),
            user_id,
            created_at: now,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

/// Description of the cookie that carries a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    /// Seconds until the cookie expires; `None` for a browser-session cookie.
    pub max_age: Option<u64>,
}

/// In-memory session store.
///
/// Created once per service and shared behind an `Arc`; `clear` resets it
/// on shutdown or between tests. The map is sharded, so token lookups never
/// wait on a store-wide lock.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    verifier: Arc<dyn CredentialVerifier>,
    ttl: Option<Duration>,
    cookie_name: String,
}

impl SessionStore {
    /// Create a store using `verifier` to check credentials.
    pub fn new(verifier: Arc<dyn CredentialVerifier>, config: &SessionConfig) -> Self {
        let ttl = (config.ttl_secs > 0).then(|| Duration::from_secs(config.ttl_secs));
        Self {
            sessions: DashMap::new(),
            verifier,
            ttl,
            cookie_name: config.cookie_name.clone(),
        }
    }

    /// Authenticate and open a new session.
    ///
    /// Fails with `NotAuthenticated` when the credentials do not match.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let Some(user_id) = self.verifier.verify(username, password).await? else {
            warn!(username = %username, "Login failed: invalid credentials");
            return Err(SessionError::InvalidCredentials.into());
        };

        let session = Session::new(user_id, self.ttl);
        self.sessions.insert(session.token.clone(), session.clone());

        info!(user_id = %session.user_id, "Login successful");
        Ok(session)
    }

    /// Invalidate a session. Unknown or missing tokens are ignored.
    ///
    /// Returns whether a live session was removed.
    pub fn logout(&self, token: Option<&str>) -> bool {
        let Some(token) = token else {
            return false;
        };

        match self.sessions.remove(token) {
            Some((_, session)) => {
                info!(user_id = %session.user_id, "Session logged out");
                true
            }
            None => {
                debug!("Logout: session not found");
                false
            }
        }
    }

    /// Invalidate every session of a user. Returns how many were removed.
    pub fn logout_user(&self, user_id: &str) -> usize {
        let mut count = 0;
        self.sessions.retain(|_, s| {
            let keep = s.user_id != user_id;
            if !keep {
                count += 1;
            }
            keep
        });

        if count > 0 {
            info!(user_id = %user_id, count, "All user sessions logged out");
        }
        count
    }

    /// Look up the session for `token`, dropping it if expired.
    pub fn session(&self, token: Option<&str>) -> std::result::Result<Session, SessionError> {
        let token = token.ok_or(SessionError::MissingToken)?;

        let session = self
            .sessions
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or(SessionError::SessionNotFound)?;

        if session.is_expired() {
            self.sessions.remove_if(token, |_, s| s.is_expired());
            debug!(user_id = %session.user_id, "Session expired");
            return Err(SessionError::SessionExpired);
        }
        Ok(session)
    }

    /// Resolve a token to the authenticated user id.
    pub fn resolve(&self, token: Option<&str>) -> Result<String> {
        Ok(self.session(token)?.user_id)
    }

    /// Describe the cookie that delivers `session` to the client.
    pub fn cookie_for(&self, session: &Session) -> SessionCookie {
        SessionCookie {
            name: self.cookie_name.clone(),
            value: session.token.clone(),
            max_age: self.ttl.map(|d| d.as_secs()),
        }
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.sessions.retain(|_, s| {
            let expired = s.is_expired();
            if expired {
                removed += 1;
            }
            !expired
        });
        if removed > 0 {
            debug!(removed, "Cleaned up expired sessions");
        }
        removed
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) every `every` in the
    /// background. The task ends once the store is dropped.
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("Session store dropped, stopping cleanup");
                    break;
                };
                let removed = store.cleanup_expired();
                if removed > 0 {
                    info!(removed, "Expired sessions cleaned up");
                }
            }
        })
    }

    /// Drop every session.
    pub fn clear(&self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("ttl", &self.ttl)
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedCredentials;

    #[async_trait]
    impl CredentialVerifier for FixedCredentials {
        async fn verify(&self, username: &str, password: &str) -> Result<Option<String>> {
            Ok((password == "letmein-please").then(|| username.to_string()))
        }
    }

    fn store_with_ttl(ttl_secs: u64) -> SessionStore {
        let config = SessionConfig {
            ttl_secs,
            ..SessionConfig::default()
        };
        SessionStore::new(Arc::new(FixedCredentials), &config)
    }

    #[tokio::test]
    async fn test_login_and_resolve() {
        let store = store_with_ttl(0);
        let session = store.login("alice", "letmein-please").await.unwrap();

        assert_eq!(session.token.len(), 32);
        assert!(session.expires_at.is_none());
        assert_eq!(store.resolve(Some(&session.token)).unwrap(), "alice");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let store = store_with_ttl(0);
        let result = store.login("alice", "nope").await;
        assert!(matches!(result, Err(CorkboardError::NotAuthenticated)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let store = store_with_ttl(0);
        let a = store.login("alice", "letmein-please").await.unwrap();
        let b = store.login("alice", "letmein-please").await.unwrap();
        assert_ne!(a.token, b.token);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let store = store_with_ttl(0);
        let session = store.login("alice", "letmein-please").await.unwrap();

        assert!(store.logout(Some(&session.token)));
        assert!(!store.logout(Some(&session.token)));
        assert!(!store.logout(Some("never-issued")));
        assert!(!store.logout(None));

        assert!(matches!(
            store.resolve(Some(&session.token)),
            Err(CorkboardError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_resolve_missing_or_unknown() {
        let store = store_with_ttl(0);
        assert_eq!(store.session(None), Err(SessionError::MissingToken));
        assert_eq!(
            store.session(Some("unknown")),
            Err(SessionError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let store = store_with_ttl(3600);
        let mut session = store.login("alice", "letmein-please").await.unwrap();
        assert!(session.expires_at.is_some());

        // Backdate the stored session.
        session.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        store.sessions.insert(session.token.clone(), session.clone());

        assert_eq!(
            store.session(Some(&session.token)),
            Err(SessionError::SessionExpired)
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = store_with_ttl(3600);
        let mut stale = store.login("alice", "letmein-please").await.unwrap();
        store.login("bob", "letmein-please").await.unwrap();

        stale.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        store.sessions.insert(stale.token.clone(), stale);

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_background_cleanup() {
        let store = Arc::new(store_with_ttl(3600));
        let mut stale = store.login("alice", "letmein-please").await.unwrap();
        let fresh = store.login("bob", "letmein-please").await.unwrap();
        stale.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        store.sessions.insert(stale.token.clone(), stale);

        let task = store.spawn_cleanup(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.resolve(Some(&fresh.token)).unwrap(), "bob");

        drop(store);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_logout_user() {
        let store = store_with_ttl(0);
        store.login("alice", "letmein-please").await.unwrap();
        store.login("alice", "letmein-please").await.unwrap();
        let bob = store.login("bob", "letmein-please").await.unwrap();

        assert_eq!(store.logout_user("alice"), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.resolve(Some(&bob.token)).unwrap(), "bob");
    }

    #[tokio::test]
    async fn test_cookie_for() {
        let store = store_with_ttl(60);
        let session = store.login("alice", "letmein-please").await.unwrap();
        let cookie = store.cookie_for(&session);
        assert_eq!(cookie.name, "corkboard_session");
        assert_eq!(cookie.value, session.token);
        assert_eq!(cookie.max_age, Some(60));

        let store = store_with_ttl(0);
        let session = store.login("alice", "letmein-please").await.unwrap();
        assert_eq!(store.cookie_for(&session).max_age, None);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = store_with_ttl(0);
        store.login("alice", "letmein-please").await.unwrap();
        store.clear();
        assert!(store.is_empty());
    }
}
