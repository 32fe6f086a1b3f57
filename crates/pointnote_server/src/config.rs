//! Environment-driven server configuration.
//!
//! # Invariants
//! - Unset or blank variables fall back to defaults.
//! - A set but invalid variable is an error, never silently defaulted.

use pointnote_core::default_log_level;
use pointnote_core::logging::{normalize_level, normalize_log_dir};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const BIND_ADDR_VAR: &str = "POINTNOTE_BIND_ADDR";
pub const DB_PATH_VAR: &str = "POINTNOTE_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "POINTNOTE_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "POINTNOTE_LOG_DIR";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DB_PATH: &str = "pointnote.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub log_level: &'static str,
    /// `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
}

/// A configuration variable that is set but unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: &'static str,
    pub message: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.var, self.message)
    }
}

impl Error for ConfigError {}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let raw_addr = read(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.parse::<SocketAddr>().map_err(|err| ConfigError {
            var: BIND_ADDR_VAR,
            message: format!("`{raw_addr}` is not a socket address ({err})"),
        })?;

        let db_path = PathBuf::from(read(DB_PATH_VAR).unwrap_or_else(|| DEFAULT_DB_PATH.to_string()));

        let log_level = match read(LOG_LEVEL_VAR) {
            Some(level) => normalize_level(&level).map_err(|message| ConfigError {
                var: LOG_LEVEL_VAR,
                message,
            })?,
            None => default_log_level(),
        };

        let log_dir = read(LOG_DIR_VAR)
            .map(|dir| normalize_log_dir(&dir))
            .transpose()
            .map_err(|message| ConfigError {
                var: LOG_DIR_VAR,
                message,
            })?;

        Ok(Self {
            bind_addr,
            db_path,
            log_level,
            log_dir,
        })
    }
}
