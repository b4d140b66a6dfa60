//! Local mirror of the current-user record.
//!
//! The cache is a single named entry, optionally persisted as JSON on disk
//! (the per-device storage the presentation layer would otherwise own). It is
//! a degrade-gracefully fallback for identity resolution, never a source of
//! truth: every successful remote resolution or mutation overwrites it
//! wholesale.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::dao::models::UserEntity;

/// Cached current-user entry with optional file persistence.
pub struct UserCache {
    path: Option<PathBuf>,
    current: RwLock<Option<UserEntity>>,
}

impl UserCache {
    /// Cache living only for the lifetime of the session.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(None),
        }
    }

    /// File-backed cache; a pre-existing entry at `path` is loaded eagerly.
    pub fn at_path(path: PathBuf) -> Self {
        let current = load_entry(&path);
        Self {
            path: Some(path),
            current: RwLock::new(current),
        }
    }

    /// The cached user, if any.
    pub async fn get(&self) -> Option<UserEntity> {
        self.current.read().await.clone()
    }

    /// Overwrite the entry, writing through to disk when file-backed.
    pub async fn set(&self, user: UserEntity) {
        if let Some(path) = &self.path {
            persist_entry(path, &user);
        }
        *self.current.write().await = Some(user);
    }

    /// Drop the entry and its on-disk copy.
    pub async fn clear(&self) {
        if let Some(path) = &self.path {
            if let Err(err) = fs::remove_file(path) {
                if err.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "failed to remove cached user");
                }
            }
        }
        *self.current.write().await = None;
    }
}

/// Read a persisted entry, treating a missing or corrupt file as empty.
fn load_entry(path: &Path) -> Option<UserEntity> {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<UserEntity>(&contents) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "cached user is corrupt; ignoring it"
                );
                None
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "failed to read cached user");
            None
        }
    }
}

fn persist_entry(path: &Path, user: &UserEntity) {
    let contents = match serde_json::to_string(user) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(error = %err, "failed to encode cached user");
            return;
        }
    };
    if let Err(err) = fs::write(path, contents) {
        warn!(path = %path.display(), error = %err, "failed to persist cached user");
    }
}
