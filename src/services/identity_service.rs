//! Identity resolution and profile persistence.

use std::time::SystemTime;

use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{ProfileUpdate, models::UserEntity},
    dto::profile::ProfileInput,
    error::ServiceError,
    session::Session,
};

/// Resolve the session's caller to a user record.
///
/// The store is queried first; a hit refreshes the local cache. On a miss the
/// cached record is served if present (availability over consistency), and an
/// unreachable store degrades to the cache the same way. Only an unreachable
/// store with an empty cache is an error; an anonymous caller is `Ok(None)`.
pub async fn current_user(session: &Session) -> Result<Option<UserEntity>, ServiceError> {
    match session
        .store()
        .find_user_by_identity(session.identity().clone())
        .await
    {
        Ok(Some(user)) => {
            session.cache().set(user.clone()).await;
            Ok(Some(user))
        }
        Ok(None) => Ok(session.cache().get().await),
        Err(err) => match session.cache().get().await {
            Some(cached) => {
                warn!(error = %err, "user lookup failed; serving cached user");
                Ok(Some(cached))
            }
            None => {
                error!(error = %err, "user lookup failed with no cached fallback");
                Err(err.into())
            }
        },
    }
}

/// Resolve the caller or refuse the operation.
pub(crate) async fn require_user(session: &Session) -> Result<UserEntity, ServiceError> {
    current_user(session)
        .await?
        .ok_or(ServiceError::NotAuthenticated)
}

/// Create or update the caller's profile.
///
/// The create path starts every aggregate counter at zero; the update path
/// touches only the profile fields and the update timestamp. Both refresh the
/// cache with the saved record.
pub async fn save_profile(
    session: &Session,
    input: ProfileInput,
) -> Result<UserEntity, ServiceError> {
    input.validate()?;
    if input.display_name.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "display name must not be blank".into(),
        ));
    }

    let now = SystemTime::now();
    let saved = match current_user(session).await? {
        Some(mut user) => {
            session
                .store()
                .update_user_profile(
                    user.id,
                    ProfileUpdate {
                        display_name: input.display_name.clone(),
                        avatar_url: input.avatar_url.clone(),
                        updated_at: now,
                    },
                )
                .await?;
            user.display_name = input.display_name;
            user.avatar_url = input.avatar_url;
            user.updated_at = now;
            user
        }
        None => {
            let user = UserEntity {
                id: Uuid::new_v4(),
                identity: session.identity().clone(),
                display_name: input.display_name,
                avatar_url: input.avatar_url,
                games_played: 0,
                games_won: 0,
                total_score: 0,
                created_at: now,
                updated_at: now,
            };
            session.store().insert_user(user.clone()).await?;
            info!(user_id = %user.id, "created user");
            user
        }
    };

    session.cache().set(saved.clone()).await;
    Ok(saved)
}

/// Forget the cached current user, e.g. on logout. The store is untouched.
pub async fn sign_out(session: &Session) {
    session.cache().clear().await;
    info!("cleared cached user");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{memory::MemoryScoreStore, models::IdentityToken},
        services::testing::{FailingStore, profile, session, signed_in},
        session::Session,
    };

    fn temp_cache_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tally-rooms-cache-{}.json", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn anonymous_caller_resolves_to_none() {
        let store = MemoryScoreStore::new();
        let session = session(&store, "openid-anon");

        let user = current_user(&session).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn save_profile_creates_with_zeroed_counters() {
        let store = MemoryScoreStore::new();
        let session = session(&store, "openid-1");

        let user = save_profile(&session, profile("Ada")).await.unwrap();

        assert_eq!(user.display_name, "Ada");
        assert_eq!(user.identity, IdentityToken::from("openid-1"));
        assert_eq!(user.games_played, 0);
        assert_eq!(user.games_won, 0);
        assert_eq!(user.total_score, 0);
    }

    #[tokio::test]
    async fn save_profile_is_idempotent_on_repetition() {
        let store = MemoryScoreStore::new();
        let session = session(&store, "openid-1");

        let first = save_profile(&session, profile("Ada")).await.unwrap();
        let second = save_profile(&session, profile("Ada Lovelace")).await.unwrap();

        // Same account, new profile fields, counters untouched.
        assert_eq!(second.id, first.id);
        assert_eq!(second.display_name, "Ada Lovelace");
        assert_eq!(second.games_played, 0);
        assert_eq!(second.games_won, 0);
        assert_eq!(second.total_score, 0);
        assert_eq!(second.created_at, first.created_at);

        let stored = current_user(&session).await.unwrap().unwrap();
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn save_profile_rejects_blank_names() {
        let store = MemoryScoreStore::new();
        let session = session(&store, "openid-1");

        let empty = save_profile(
            &session,
            ProfileInput {
                display_name: String::new(),
                avatar_url: String::new(),
            },
        )
        .await;
        assert!(matches!(empty, Err(ServiceError::InvalidInput(_))));

        let blank = save_profile(
            &session,
            ProfileInput {
                display_name: "   ".into(),
                avatar_url: String::new(),
            },
        )
        .await;
        assert!(matches!(blank, Err(ServiceError::InvalidInput(_))));

        let too_long = save_profile(
            &session,
            ProfileInput {
                display_name: "x".repeat(65),
                avatar_url: String::new(),
            },
        )
        .await;
        assert!(matches!(too_long, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn cache_covers_a_store_miss() {
        let path = temp_cache_path();
        let store = MemoryScoreStore::new();
        let config = AppConfig::default().with_cache_path(path.clone());
        let session_one = Session::new(
            Arc::new(store.clone()),
            IdentityToken::from("openid-1"),
            config.clone(),
        );
        save_profile(&session_one, profile("Ada")).await.unwrap();

        // Fresh store without the user; the persisted cache entry answers.
        let empty_store = MemoryScoreStore::new();
        let session_two = Session::new(
            Arc::new(empty_store),
            IdentityToken::from("openid-1"),
            config,
        );
        let user = current_user(&session_two).await.unwrap().unwrap();
        assert_eq!(user.display_name, "Ada");

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn cache_covers_an_unreachable_store() {
        let path = temp_cache_path();
        let store = MemoryScoreStore::new();
        let config = AppConfig::default().with_cache_path(path.clone());
        let session_one = Session::new(
            Arc::new(store),
            IdentityToken::from("openid-1"),
            config.clone(),
        );
        save_profile(&session_one, profile("Ada")).await.unwrap();

        let session_two = Session::new(Arc::new(FailingStore), IdentityToken::from("openid-1"), config);
        let user = current_user(&session_two).await.unwrap().unwrap();
        assert_eq!(user.display_name, "Ada");

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn unreachable_store_without_cache_is_an_error() {
        let session = Session::new(
            Arc::new(FailingStore),
            IdentityToken::from("openid-1"),
            AppConfig::default(),
        );

        let result = current_user(&session).await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn sign_out_drops_the_persisted_entry() {
        let path = temp_cache_path();
        let store = MemoryScoreStore::new();
        let config = AppConfig::default().with_cache_path(path.clone());
        let session = Session::new(
            Arc::new(store),
            IdentityToken::from("openid-1"),
            config,
        );

        save_profile(&session, profile("Ada")).await.unwrap();
        assert!(path.exists());

        sign_out(&session).await;
        assert!(!path.exists());
        assert!(session.cache().get().await.is_none());
    }

    #[tokio::test]
    async fn resolution_refreshes_the_cache() {
        let store = MemoryScoreStore::new();
        let (session_one, user) = signed_in(&store, "openid-1", "Ada").await;
        drop(session_one);

        // A brand-new session starts with an empty cache; resolving fills it.
        let session_two = session(&store, "openid-1");
        assert!(session_two.cache().get().await.is_none());
        let resolved = current_user(&session_two).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(session_two.cache().get().await.unwrap().id, user.id);
    }
}
