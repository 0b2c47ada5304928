//! Configuration module for corkboard.

use serde::Deserialize;
use std::path::Path;

use crate::{CorkboardError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/corkboard.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/corkboard.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Absolute session lifetime in seconds. 0 keeps sessions until logout.
    #[serde(default)]
    pub ttl_secs: u64,
    /// Name of the cookie carrying the session token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// How often expired sessions are purged, in seconds. 0 disables the task.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

fn default_cookie_name() -> String {
    "corkboard_session".to_string()
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 0,
            cookie_name: default_cookie_name(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

/// Board and pin service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Search limit used when the caller gives none.
    #[serde(default = "default_search_limit")]
    pub default_search_limit: u32,
    /// Upper bound on any search limit.
    #[serde(default = "default_max_search_limit")]
    pub max_search_limit: u32,
    /// How long a mutation waits for a board's lock before failing with a conflict.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
}

fn default_search_limit() -> u32 {
    20
}

fn default_max_search_limit() -> u32 {
    100
}

fn default_lock_timeout() -> u64 {
    5000
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            default_search_limit: default_search_limit(),
            max_search_limit: default_max_search_limit(),
            lock_timeout_ms: default_lock_timeout(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Board and pin configuration.
    #[serde(default)]
    pub board: BoardConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(CorkboardError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CorkboardError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CORKBOARD_DATABASE_PATH`: Override the database file path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CORKBOARD_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.board.default_search_limit == 0 || self.board.max_search_limit == 0 {
            return Err(CorkboardError::Config(
                "search limits must be greater than zero".to_string(),
            ));
        }
        if self.board.default_search_limit > self.board.max_search_limit {
            return Err(CorkboardError::Config(
                "default_search_limit must not exceed max_search_limit".to_string(),
            ));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(CorkboardError::Config(
                "session.cookie_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
