//! End-of-game settlement.
//!
//! Settlement turns a playing room into an immutable game snapshot plus one
//! outcome row per participant, back-fills the room's ledger entries with the
//! game id, and folds each participant's final score into their lifetime
//! counters.
//!
//! There is no multi-document transaction to lean on, so the room status is
//! used as a durable marker instead: the room is moved to `Settling` before
//! any snapshot write and to `Finished` only after the last one. Every step
//! in between is keyed so that re-running it is a no-op, which lets a
//! settlement interrupted by a crash be resumed by calling [`settle_game`]
//! again.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        RoomTransition, UserResultDelta,
        models::{GameEntity, GamePlayerEntity, RoomEntity, RoomPlayerEntity, RoomStatus},
    },
    error::ServiceError,
    services::identity_service,
    session::Session,
};

/// Settle a room into a game snapshot. Owner only.
///
/// Returns the snapshot; on a resumed settlement this is the snapshot the
/// interrupted run already created.
pub async fn settle_game(session: &Session, room_id: Uuid) -> Result<GameEntity, ServiceError> {
    let user = identity_service::require_user(session).await?;

    let Some(room) = session.store().find_room(room_id).await? else {
        return Err(ServiceError::RoomNotFound(format!(
            "room `{room_id}` not found"
        )));
    };
    if room.owner_id != user.id {
        return Err(ServiceError::NotOwner { room_id });
    }

    claim_settlement(session, &room).await?;

    let started_at = room.started_at.ok_or_else(|| {
        ServiceError::InvalidState(format!("room `{}` has no start time", room.code))
    })?;
    let now = SystemTime::now();
    let duration_secs = now
        .duration_since(started_at)
        .unwrap_or_default()
        .as_secs();

    let players = session.store().list_active_players(room_id).await?;
    let records = session.store().list_score_records(room_id).await?;

    // Find-or-create keyed by room: a resumed run reuses the snapshot the
    // interrupted one wrote.
    let game = match session.store().find_game_by_room(room_id).await? {
        Some(existing) => existing,
        None => {
            let game = GameEntity {
                id: Uuid::new_v4(),
                room_id,
                room_code: room.code.clone(),
                mode: room.mode.clone(),
                owner_id: room.owner_id,
                owner_name: room.owner_name.clone(),
                player_count: players.len() as u32,
                duration_secs,
                record_count: records.len() as u32,
                started_at,
                ended_at: now,
                created_at: now,
            };
            session.store().insert_game(game.clone()).await?;
            game
        }
    };

    let tagged = session
        .store()
        .attach_records_to_game(room_id, game.id)
        .await?;

    let ranked = rank_players(players);
    for (rank, player) in ranked.iter().enumerate() {
        let is_win = player.score > 0;
        let outcome = GamePlayerEntity {
            id: Uuid::new_v4(),
            game_id: game.id,
            room_id,
            user_id: player.user_id,
            identity: player.identity.clone(),
            display_name: player.display_name.clone(),
            avatar_url: player.avatar_url.clone(),
            final_score: player.score,
            rank: rank as u32 + 1,
            is_win,
            created_at: now,
        };

        // Counters move only with a freshly created outcome row; a resumed
        // settlement skips participants the interrupted run already handled.
        let created = session.store().insert_game_player_if_absent(outcome).await?;
        if created {
            session
                .store()
                .apply_user_result(
                    player.user_id,
                    UserResultDelta {
                        games_played: 1,
                        games_won: u32::from(is_win),
                        total_score: player.score,
                        updated_at: now,
                    },
                )
                .await?;
        }
    }

    let finished = session
        .store()
        .transition_room(room_id, RoomTransition::Finish { at: now })
        .await?;
    if !finished {
        debug!(room_id = %room_id, "room already left the settling status");
    }

    info!(
        room_id = %room_id,
        game_id = %game.id,
        players = ranked.len(),
        records_tagged = tagged,
        "settled game"
    );
    Ok(game)
}

/// Move the room into `Settling`, or verify that it already is (resume).
async fn claim_settlement(session: &Session, room: &RoomEntity) -> Result<(), ServiceError> {
    match room.status {
        RoomStatus::Playing => {
            let claimed = session
                .store()
                .transition_room(room.id, RoomTransition::BeginSettlement)
                .await?;
            if !claimed {
                return Err(ServiceError::InvalidState(format!(
                    "room `{}` is no longer playing",
                    room.code
                )));
            }
            Ok(())
        }
        RoomStatus::Settling => {
            info!(room_id = %room.id, "resuming an interrupted settlement");
            Ok(())
        }
        RoomStatus::Waiting => Err(ServiceError::InvalidState(format!(
            "room `{}` was never started",
            room.code
        ))),
        RoomStatus::Finished => Err(ServiceError::InvalidState(format!(
            "room `{}` is already settled",
            room.code
        ))),
    }
}

/// Descending score; the sort is stable, so ties keep their join order.
fn rank_players(mut players: Vec<RoomPlayerEntity>) -> Vec<RoomPlayerEntity> {
    players.sort_by(|a, b| b.score.cmp(&a.score));
    players
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{ScoreStore, memory::MemoryScoreStore},
        services::{
            room_service,
            room_service::DEFAULT_MODE,
            score_service,
            testing::{session, signed_in},
        },
        session::Session,
    };

    /// Room with Ada (owner), Grace, and Edsger seated and the game started.
    /// Scores after the transfers: Ada 30, Grace 10, Edsger 30.
    async fn played_room(store: &MemoryScoreStore) -> (Session, crate::dao::models::RoomEntity) {
        let (ada_session, ada) = signed_in(store, "openid-ada", "Ada").await;
        let room = room_service::create_room(&ada_session, DEFAULT_MODE)
            .await
            .unwrap();

        let (grace_session, grace) = signed_in(store, "openid-grace", "Grace").await;
        room_service::join_room(&grace_session, &room.code)
            .await
            .unwrap();
        let (edsger_session, edsger) = signed_in(store, "openid-edsger", "Edsger").await;
        room_service::join_room(&edsger_session, &room.code)
            .await
            .unwrap();

        room_service::start_game(&ada_session, room.id).await.unwrap();

        score_service::give_score(&grace_session, room.id, ada.id, 30)
            .await
            .unwrap();
        score_service::give_score(&ada_session, room.id, grace.id, 10)
            .await
            .unwrap();
        score_service::give_score(&grace_session, room.id, edsger.id, 30)
            .await
            .unwrap();

        (ada_session, room)
    }

    #[tokio::test]
    async fn settle_ranks_players_with_stable_ties() {
        let store = MemoryScoreStore::new();
        let (ada_session, room) = played_room(&store).await;

        let game = settle_game(&ada_session, room.id).await.unwrap();
        assert_eq!(game.player_count, 3);
        assert_eq!(game.record_count, 3);

        let mut names_by_rank: Vec<(u32, String, i64, bool)> = Vec::new();
        for identity in ["openid-ada", "openid-grace", "openid-edsger"] {
            let user = store
                .find_user_by_identity(identity.into())
                .await
                .unwrap()
                .unwrap();
            for row in store.list_results_for_user(user.id, 10, 0).await.unwrap() {
                names_by_rank.push((row.rank, row.display_name, row.final_score, row.is_win));
            }
        }
        names_by_rank.sort();

        // Ada and Edsger tie at 30; Ada joined first so she ranks above.
        assert_eq!(
            names_by_rank,
            vec![
                (1, "Ada".to_owned(), 30, true),
                (2, "Edsger".to_owned(), 30, true),
                (3, "Grace".to_owned(), 10, true),
            ]
        );

        let stored = store.find_room(room.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RoomStatus::Finished);
        assert!(stored.ended_at.is_some());
    }

    #[tokio::test]
    async fn settle_updates_lifetime_counters() {
        let store = MemoryScoreStore::new();
        let (ada_session, room) = played_room(&store).await;

        settle_game(&ada_session, room.id).await.unwrap();

        let ada = store
            .find_user_by_identity("openid-ada".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ada.games_played, 1);
        assert_eq!(ada.games_won, 1);
        assert_eq!(ada.total_score, 30);

        let grace = store
            .find_user_by_identity("openid-grace".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grace.games_played, 1);
        assert_eq!(grace.games_won, 1);
        assert_eq!(grace.total_score, 10);
    }

    #[tokio::test]
    async fn settle_treats_non_positive_scores_as_losses() {
        let store = MemoryScoreStore::new();
        let (ada_session, ada) = signed_in(&store, "openid-ada", "Ada").await;
        let room = room_service::create_room(&ada_session, DEFAULT_MODE)
            .await
            .unwrap();
        let (grace_session, grace) = signed_in(&store, "openid-grace", "Grace").await;
        room_service::join_room(&grace_session, &room.code)
            .await
            .unwrap();
        room_service::start_game(&ada_session, room.id).await.unwrap();
        // Grace pays Ada 15: Ada +15, Grace -15 is recorded by a second
        // transfer, leaving Grace negative and Ada positive.
        score_service::give_score(&grace_session, room.id, ada.id, 15)
            .await
            .unwrap();
        score_service::give_score(&ada_session, room.id, grace.id, -15)
            .await
            .unwrap();

        settle_game(&ada_session, room.id).await.unwrap();

        let ada_row = store.list_results_for_user(ada.id, 10, 0).await.unwrap();
        assert!(ada_row[0].is_win);
        let grace_row = store.list_results_for_user(grace.id, 10, 0).await.unwrap();
        assert!(!grace_row[0].is_win);

        let grace_user = store
            .find_user_by_identity("openid-grace".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grace_user.games_won, 0);
        assert_eq!(grace_user.total_score, -15);
    }

    #[tokio::test]
    async fn settle_backfills_every_record() {
        let store = MemoryScoreStore::new();
        let (ada_session, room) = played_room(&store).await;

        let game = settle_game(&ada_session, room.id).await.unwrap();

        let records = store.list_score_records(room.id).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.game_id == Some(game.id)));
    }

    #[tokio::test]
    async fn settle_is_owner_only() {
        let store = MemoryScoreStore::new();
        let (_, room) = played_room(&store).await;

        let grace_session = session(&store, "openid-grace");
        let result = settle_game(&grace_session, room.id).await;
        assert!(matches!(result, Err(ServiceError::NotOwner { .. })));

        let stored = store.find_room(room.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RoomStatus::Playing);
    }

    #[tokio::test]
    async fn settle_refuses_rooms_that_never_started() {
        let store = MemoryScoreStore::new();
        let (ada_session, _) = signed_in(&store, "openid-ada", "Ada").await;
        let room = room_service::create_room(&ada_session, DEFAULT_MODE)
            .await
            .unwrap();

        let result = settle_game(&ada_session, room.id).await;
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn settle_runs_at_most_once() {
        let store = MemoryScoreStore::new();
        let (ada_session, room) = played_room(&store).await;

        settle_game(&ada_session, room.id).await.unwrap();
        let again = settle_game(&ada_session, room.id).await;
        assert!(matches!(again, Err(ServiceError::InvalidState(_))));

        let ada = store
            .find_user_by_identity("openid-ada".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ada.games_played, 1);
    }

    #[tokio::test]
    async fn settle_resumes_after_an_interruption_without_double_counting() {
        let store = MemoryScoreStore::new();
        let (ada_session, room) = played_room(&store).await;

        // Simulate a run that crashed right after claiming the settlement
        // and writing the game snapshot plus Ada's outcome and counters.
        let claimed = store
            .transition_room(room.id, RoomTransition::BeginSettlement)
            .await
            .unwrap();
        assert!(claimed);

        let ada = store
            .find_user_by_identity("openid-ada".into())
            .await
            .unwrap()
            .unwrap();
        let players = store.list_active_players(room.id).await.unwrap();
        let ada_seat = players.iter().find(|p| p.user_id == ada.id).unwrap();
        let now = SystemTime::now();
        let partial_game = GameEntity {
            id: Uuid::new_v4(),
            room_id: room.id,
            room_code: room.code.clone(),
            mode: room.mode.clone(),
            owner_id: room.owner_id,
            owner_name: room.owner_name.clone(),
            player_count: players.len() as u32,
            duration_secs: 1,
            record_count: 3,
            started_at: now,
            ended_at: now,
            created_at: now,
        };
        store.insert_game(partial_game.clone()).await.unwrap();
        store
            .insert_game_player_if_absent(GamePlayerEntity {
                id: Uuid::new_v4(),
                game_id: partial_game.id,
                room_id: room.id,
                user_id: ada.id,
                identity: ada.identity.clone(),
                display_name: ada.display_name.clone(),
                avatar_url: ada.avatar_url.clone(),
                final_score: ada_seat.score,
                rank: 1,
                is_win: true,
                created_at: now,
            })
            .await
            .unwrap();
        store
            .apply_user_result(
                ada.id,
                UserResultDelta {
                    games_played: 1,
                    games_won: 1,
                    total_score: ada_seat.score,
                    updated_at: now,
                },
            )
            .await
            .unwrap();

        // Resume: same snapshot comes back, everyone ends up settled exactly
        // once.
        let game = settle_game(&ada_session, room.id).await.unwrap();
        assert_eq!(game.id, partial_game.id);

        let ada_after = store
            .find_user_by_identity("openid-ada".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ada_after.games_played, 1);
        assert_eq!(ada_after.total_score, 30);

        let grace = store
            .find_user_by_identity("openid-grace".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grace.games_played, 1);
        assert_eq!(grace.total_score, 10);

        let records = store.list_score_records(room.id).await.unwrap();
        assert!(records.iter().all(|r| r.game_id == Some(game.id)));

        let stored = store.find_room(room.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RoomStatus::Finished);
    }
}
