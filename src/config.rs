//! Persistence configuration loading: database location and SQLite tuning.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the tool looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/persistence.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GOD_PERSISTENCE_CONFIG_PATH";
/// Save database used when the configuration does not name one.
const DEFAULT_DATABASE_PATH: &str = "saves/GodsOfDeceit.db";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable persistence configuration.
pub struct PersistenceConfig {
    database_path: PathBuf,
    wal_mode: bool,
    vacuum_on_startup: bool,
}

impl PersistenceConfig {
    /// Configuration for the database at `database_path` with default tuning.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    /// Toggle write-ahead logging on every opened session.
    pub fn with_wal_mode(mut self, wal_mode: bool) -> Self {
        self.wal_mode = wal_mode;
        self
    }

    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration stored at `path`, falling back to built-in defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        database = %config.database_path.display(),
                        "loaded persistence config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// SQLite file holding the saves.
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Whether sessions switch the journal to WAL on open.
    pub fn wal_mode(&self) -> bool {
        self.wal_mode
    }

    /// Whether the binary compacts the file after initialization.
    pub fn vacuum_on_startup(&self) -> bool {
        self.vacuum_on_startup
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            wal_mode: true,
            vacuum_on_startup: false,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    database_path: Option<PathBuf>,
    wal_mode: Option<bool>,
    vacuum_on_startup: Option<bool>,
}

impl From<RawConfig> for PersistenceConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            database_path: value.database_path.unwrap_or(defaults.database_path),
            wal_mode: value.wal_mode.unwrap_or(defaults.wal_mode),
            vacuum_on_startup: value.vacuum_on_startup.unwrap_or(defaults.vacuum_on_startup),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
