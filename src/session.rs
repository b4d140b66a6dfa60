//! Per-caller context threaded through every service operation.

use std::sync::Arc;

use crate::{cache::UserCache, config::AppConfig, dao::ScoreStore, dao::models::IdentityToken};

/// Everything one caller's operations run against: the store handle, the
/// platform identity token, the local user cache, and the runtime
/// configuration.
///
/// The cache is deliberately session state rather than ambient storage, so
/// two sessions never share a current-user entry behind each other's back.
pub struct Session {
    store: Arc<dyn ScoreStore>,
    identity: IdentityToken,
    cache: UserCache,
    config: AppConfig,
}

impl Session {
    /// Build a session for the given caller. A configured cache path turns on
    /// file persistence for the current-user entry.
    pub fn new(store: Arc<dyn ScoreStore>, identity: IdentityToken, config: AppConfig) -> Self {
        let cache = match config.cache_path() {
            Some(path) => UserCache::at_path(path.clone()),
            None => UserCache::in_memory(),
        };
        Self {
            store,
            identity,
            cache,
            config,
        }
    }

    /// Handle to the document store.
    pub fn store(&self) -> &Arc<dyn ScoreStore> {
        &self.store
    }

    /// The caller's platform identity token.
    pub fn identity(&self) -> &IdentityToken {
        &self.identity
    }

    /// The session-local current-user cache.
    pub fn cache(&self) -> &UserCache {
        &self.cache
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
