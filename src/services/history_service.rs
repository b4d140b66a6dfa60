//! Per-user game history.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::GameEntity,
    dto::history::{GameResult, HistoryEntry},
    error::ServiceError,
    services::identity_service,
    session::Session,
};

/// The caller's settled games, newest first, paginated by `offset`/`limit`.
///
/// An anonymous caller gets an empty page rather than an error. Each outcome
/// row is merged with the game snapshot it references; rows whose snapshot is
/// missing are skipped.
pub async fn user_history(
    session: &Session,
    limit: u64,
    offset: u64,
) -> Result<Vec<HistoryEntry>, ServiceError> {
    let Some(user) = identity_service::current_user(session).await? else {
        return Ok(Vec::new());
    };

    let results = session
        .store()
        .list_results_for_user(user.id, limit, offset)
        .await?;

    let mut ids: Vec<Uuid> = results.iter().map(|row| row.game_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let games: HashMap<Uuid, GameEntity> = session
        .store()
        .load_games(ids)
        .await?
        .into_iter()
        .map(|game| (game.id, game))
        .collect();

    let entries = results
        .into_iter()
        .filter_map(|player| {
            let Some(game) = games.get(&player.game_id).cloned() else {
                warn!(game_id = %player.game_id, "outcome references a missing game; skipping");
                return None;
            };
            let result = GameResult::from_win(player.is_win);
            Some(HistoryEntry {
                player,
                game,
                result,
            })
        })
        .collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{ScoreStore, memory::MemoryScoreStore, models::GamePlayerEntity},
        services::{
            room_service::{self, DEFAULT_MODE},
            score_service, settlement_service,
            testing::{session, signed_in},
        },
    };
    use std::time::SystemTime;

    async fn settled_room(store: &MemoryScoreStore, owner_session: &crate::session::Session) {
        let room = room_service::create_room(owner_session, DEFAULT_MODE)
            .await
            .unwrap();
        let owner = crate::services::identity_service::current_user(owner_session)
            .await
            .unwrap()
            .unwrap();
        let (guest_session, _) = signed_in(store, "openid-guest", "Grace").await;
        room_service::join_room(&guest_session, &room.code)
            .await
            .unwrap();
        room_service::start_game(owner_session, room.id).await.unwrap();
        score_service::give_score(&guest_session, room.id, owner.id, 20)
            .await
            .unwrap();
        settlement_service::settle_game(owner_session, room.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn history_is_empty_for_anonymous_callers() {
        let store = MemoryScoreStore::new();
        let anonymous = session(&store, "openid-anon");

        let entries = user_history(&anonymous, 10, 0).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn history_merges_outcomes_with_game_snapshots() {
        let store = MemoryScoreStore::new();
        let (ada_session, ada) = signed_in(&store, "openid-ada", "Ada").await;
        settled_room(&store, &ada_session).await;

        let entries = user_history(&ada_session, 10, 0).await.unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.player.user_id, ada.id);
        assert_eq!(entry.player.final_score, 20);
        assert_eq!(entry.result, GameResult::Win);
        assert_eq!(entry.game.id, entry.player.game_id);
        assert_eq!(entry.game.player_count, 2);
    }

    #[tokio::test]
    async fn history_paginates_newest_first() {
        let store = MemoryScoreStore::new();
        let (ada_session, _) = signed_in(&store, "openid-ada", "Ada").await;
        settled_room(&store, &ada_session).await;
        settled_room(&store, &ada_session).await;

        let all = user_history(&ada_session, 10, 0).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].game.created_at >= all[1].game.created_at);

        let first = user_history(&ada_session, 1, 0).await.unwrap();
        let second = user_history(&ada_session, 1, 1).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].game.id, all[0].game.id);
        assert_eq!(second[0].game.id, all[1].game.id);
    }

    #[tokio::test]
    async fn history_skips_orphaned_outcomes() {
        let store = MemoryScoreStore::new();
        let (ada_session, ada) = signed_in(&store, "openid-ada", "Ada").await;
        settled_room(&store, &ada_session).await;

        // Outcome row pointing at a game snapshot that was never written.
        store
            .insert_game_player_if_absent(GamePlayerEntity {
                id: uuid::Uuid::new_v4(),
                game_id: uuid::Uuid::new_v4(),
                room_id: uuid::Uuid::new_v4(),
                user_id: ada.id,
                identity: ada.identity.clone(),
                display_name: ada.display_name.clone(),
                avatar_url: ada.avatar_url.clone(),
                final_score: 5,
                rank: 1,
                is_win: true,
                created_at: SystemTime::now(),
            })
            .await
            .unwrap();

        let entries = user_history(&ada_session, 10, 0).await.unwrap();
        assert_eq!(entries.len(), 1);
    }
}
