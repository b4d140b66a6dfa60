//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the library looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TALLY_ROOMS_CONFIG_PATH";
/// Seats per room unless configured otherwise.
const DEFAULT_ROOM_CAPACITY: u32 = 8;
/// Bound on the generate/check retry loop for room codes.
const DEFAULT_ROOM_CODE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    room_capacity: u32,
    room_code_attempts: u32,
    cache_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        capacity = config.room_capacity,
                        "loaded configuration"
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

    /// Maximum number of players seated in a room.
    pub fn room_capacity(&self) -> u32 {
        self.room_capacity
    }

    /// Maximum number of room-code candidates tried before giving up.
    pub fn room_code_attempts(&self) -> u32 {
        self.room_code_attempts
    }

    /// Where the current-user cache entry is persisted, if anywhere.
    pub fn cache_path(&self) -> Option<&PathBuf> {
        self.cache_path.as_ref()
    }

    /// Override the cache location, e.g. for per-device storage directories.
    pub fn with_cache_path(mut self, path: PathBuf) -> Self {
        self.cache_path = Some(path);
        self
    }

    /// Override the seats-per-room limit.
    pub fn with_room_capacity(mut self, capacity: u32) -> Self {
        self.room_capacity = capacity;
        self
    }

    /// Override the room-code retry bound.
    pub fn with_room_code_attempts(mut self, attempts: u32) -> Self {
        self.room_code_attempts = attempts;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            room_capacity: DEFAULT_ROOM_CAPACITY,
            room_code_attempts: DEFAULT_ROOM_CODE_ATTEMPTS,
            cache_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    room_capacity: Option<u32>,
    room_code_attempts: Option<u32>,
    cache_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            room_capacity: value.room_capacity.unwrap_or(defaults.room_capacity),
            room_code_attempts: value
                .room_code_attempts
                .unwrap_or(defaults.room_code_attempts),
            cache_path: value.cache_path,
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
