//! In-process implementation of the [`ScoreStore`] trait.
//!
//! Documents live in concurrent maps, so the per-document atomicity contract
//! of the trait holds here exactly as it does against a remote backend.
//! Suitable for tests and offline development; everything is lost on drop.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, GamePlayerEntity, IdentityToken, PlayerStatus, RoomEntity, RoomPlayerEntity,
    RoomStatus, ScoreRecordEntity, UserEntity,
};
use crate::dao::storage::StorageResult;
use crate::dao::{ProfileUpdate, RoomTransition, ScoreStore, UserResultDelta};

/// In-memory [`ScoreStore`] backend.
#[derive(Clone, Default)]
pub struct MemoryScoreStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: DashMap<Uuid, UserEntity>,
    rooms: DashMap<Uuid, RoomEntity>,
    room_players: DashMap<Uuid, RoomPlayerEntity>,
    score_records: DashMap<Uuid, ScoreRecordEntity>,
    games: DashMap<Uuid, GameEntity>,
    // Keyed by (game_id, user_id) so the if-absent insert is a single entry
    // operation.
    game_players: DashMap<(Uuid, Uuid), GamePlayerEntity>,
}

impl MemoryScoreStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn find_user_by_identity(
        &self,
        identity: IdentityToken,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .users
                .iter()
                .find(|entry| entry.identity == identity)
                .map(|entry| entry.value().clone()))
        })
    }

    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.users.insert(user.id, user);
            Ok(())
        })
    }

    fn update_user_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut user) = store.inner.users.get_mut(&id) {
                user.display_name = update.display_name;
                user.avatar_url = update.avatar_url;
                user.updated_at = update.updated_at;
            }
            Ok(())
        })
    }

    fn apply_user_result(
        &self,
        id: Uuid,
        delta: UserResultDelta,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut user) = store.inner.users.get_mut(&id) {
                user.games_played += delta.games_played;
                user.games_won += delta.games_won;
                user.total_score += delta.total_score;
                user.updated_at = delta.updated_at;
            }
            Ok(())
        })
    }

    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.rooms.insert(room.id, room);
            Ok(())
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.rooms.get(&id).map(|entry| entry.value().clone())) })
    }

    fn find_waiting_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .rooms
                .iter()
                .find(|entry| entry.status == RoomStatus::Waiting && entry.code == code)
                .map(|entry| entry.value().clone()))
        })
    }

    fn claim_room_seat(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            // get_mut holds the shard lock, making check-and-increment atomic.
            let Some(mut room) = store.inner.rooms.get_mut(&room_id) else {
                return Ok(false);
            };
            if room.status != RoomStatus::Waiting || room.player_count >= room.capacity {
                return Ok(false);
            }
            room.player_count += 1;
            Ok(true)
        })
    }

    fn transition_room(
        &self,
        room_id: Uuid,
        transition: RoomTransition,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(mut room) = store.inner.rooms.get_mut(&room_id) else {
                return Ok(false);
            };
            let applied = match transition {
                RoomTransition::Start { at } if room.status == RoomStatus::Waiting => {
                    room.status = RoomStatus::Playing;
                    room.started_at = Some(at);
                    true
                }
                RoomTransition::BeginSettlement if room.status == RoomStatus::Playing => {
                    room.status = RoomStatus::Settling;
                    true
                }
                RoomTransition::Finish { at } if room.status == RoomStatus::Settling => {
                    room.status = RoomStatus::Finished;
                    room.ended_at = Some(at);
                    true
                }
                _ => false,
            };
            Ok(applied)
        })
    }

    fn insert_room_player(
        &self,
        player: RoomPlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.room_players.insert(player.id, player);
            Ok(())
        })
    }

    fn find_active_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoomPlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .room_players
                .iter()
                .find(|entry| {
                    entry.room_id == room_id
                        && entry.user_id == user_id
                        && entry.status == PlayerStatus::Active
                })
                .map(|entry| entry.value().clone()))
        })
    }

    fn list_active_players(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomPlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut players: Vec<RoomPlayerEntity> = store
                .inner
                .room_players
                .iter()
                .filter(|entry| entry.room_id == room_id && entry.status == PlayerStatus::Active)
                .map(|entry| entry.value().clone())
                .collect();
            players.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
            Ok(players)
        })
    }

    fn add_to_player_score(
        &self,
        player_id: Uuid,
        amount: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut player) = store.inner.room_players.get_mut(&player_id) {
                player.score += amount;
            }
            Ok(())
        })
    }

    fn insert_score_record(
        &self,
        record: ScoreRecordEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.score_records.insert(record.id, record);
            Ok(())
        })
    }

    fn list_score_records(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut records: Vec<ScoreRecordEntity> = store
                .inner
                .score_records
                .iter()
                .filter(|entry| entry.room_id == room_id)
                .map(|entry| entry.value().clone())
                .collect();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records)
        })
    }

    fn attach_records_to_game(
        &self,
        room_id: Uuid,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut rewritten = 0;
            for mut entry in store.inner.score_records.iter_mut() {
                if entry.room_id == room_id && entry.game_id.is_none() {
                    entry.game_id = Some(game_id);
                    rewritten += 1;
                }
            }
            Ok(rewritten)
        })
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.games.insert(game.id, game);
            Ok(())
        })
    }

    fn find_game_by_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .games
                .iter()
                .find(|entry| entry.room_id == room_id)
                .map(|entry| entry.value().clone()))
        })
    }

    fn load_games(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(ids
                .into_iter()
                .filter_map(|id| store.inner.games.get(&id).map(|entry| entry.value().clone()))
                .collect())
        })
    }

    fn insert_game_player_if_absent(
        &self,
        player: GamePlayerEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let key = (player.game_id, player.user_id);
            match store.inner.game_players.entry(key) {
                Entry::Occupied(_) => Ok(false),
                Entry::Vacant(slot) => {
                    slot.insert(player);
                    Ok(true)
                }
            }
        })
    }

    fn list_results_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<GamePlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut results: Vec<GamePlayerEntity> = store
                .inner
                .game_players
                .iter()
                .filter(|entry| entry.user_id == user_id)
                .map(|entry| entry.value().clone())
                .collect();
            // Newest first; rank breaks ties between rows settled in the same
            // instant so pagination stays deterministic.
            results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.rank.cmp(&b.rank)));
            Ok(results
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
