//! Service wiring for corkboard.
//!
//! `App` owns the shared state a transport layer needs: the database, the
//! session store and the board locks. It is cheap to clone.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auth::{self, DatabaseCredentials, SessionStore};
use crate::board::{BoardLocks, BoardService, PinService, TagService};
use crate::config::Config;
use crate::db::Database;
use crate::Result;

/// Shared application state.
#[derive(Clone)]
pub struct App {
    db: Database,
    sessions: Arc<SessionStore>,
    locks: Arc<BoardLocks>,
    config: Arc<Config>,
}

impl App {
    /// Open the configured database (running migrations), build the services
    /// and start the periodic session cleanup.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.database.path).await?;
        let app = Self::with_database(db, config);

        let interval = app.config.session.cleanup_interval_secs;
        if interval > 0 {
            app.sessions.spawn_cleanup(Duration::from_secs(interval));
            info!(interval_secs = interval, "Session cleanup task started");
        }
        Ok(app)
    }

    /// Build the services around an already opened database.
    pub fn with_database(db: Database, config: Config) -> Self {
        let verifier = Arc::new(DatabaseCredentials::new(db.clone()));
        let sessions = Arc::new(SessionStore::new(verifier, &config.session));
        let locks = Arc::new(BoardLocks::new(Duration::from_millis(
            config.board.lock_timeout_ms,
        )));

        info!("Services initialized");
        Self {
            db,
            sessions,
            locks,
            config: Arc::new(config),
        }
    }

    pub fn boards(&self) -> BoardService<'_> {
        BoardService::new(&self.db, &self.locks, &self.config.board)
    }

    pub fn pins(&self) -> PinService<'_> {
        PinService::new(&self.db, &self.locks, &self.config.board)
    }

    pub fn tags(&self) -> TagService<'_> {
        TagService::new(&self.db, &self.locks)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn locks(&self) -> &BoardLocks {
        &self.locks
    }

    /// Delete an account under the locks of every board it touches.
    pub async fn delete_account(&self, id: &str) -> Result<()> {
        auth::delete_account(&self.db, &self.sessions, &self.locks, id).await
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Drop every session and close the database.
    pub async fn shutdown(&self) {
        self.sessions.clear();
        self.db.close().await;
        info!("Shut down");
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("sessions", &self.sessions)
            .field("locks", &self.locks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_with_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("app.db").to_string_lossy().into_owned();

        let app = App::open(config).await.unwrap();
        assert!(app.db().table_exists("boards").await.unwrap());
        assert!(app.sessions().is_empty());
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let mut config = Config::default();
        config.board.max_search_limit = 0;
        assert!(App::open(config).await.is_err());
    }
}
