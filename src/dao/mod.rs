/// In-process backend over concurrent maps.
pub mod memory;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
#[cfg(feature = "mongo-store")]
/// MongoDB backend.
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, GamePlayerEntity, IdentityToken, RoomEntity, RoomPlayerEntity, ScoreRecordEntity,
    UserEntity,
};
use crate::dao::storage::StorageResult;

/// Profile fields rewritten by a user update; counters are left untouched.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    /// New display name.
    pub display_name: String,
    /// New avatar reference.
    pub avatar_url: String,
    /// Update timestamp to stamp on the row.
    pub updated_at: SystemTime,
}

/// Aggregate counter deltas applied to a user when a game settles.
///
/// Applied as a single in-place increment so a resumed settlement can be
/// skipped entirely rather than reconciled.
#[derive(Debug, Clone, Copy)]
pub struct UserResultDelta {
    /// Increment for the games-played counter; 1 per settled game.
    pub games_played: u32,
    /// Increment for the games-won counter.
    pub games_won: u32,
    /// Increment for the lifetime score total.
    pub total_score: i64,
    /// Update timestamp to stamp on the row.
    pub updated_at: SystemTime,
}

/// Conditional room status transition. Each variant names the only source
/// status it matches; a transition against any other status is a no-op
/// reported as `false`.
#[derive(Debug, Clone, Copy)]
pub enum RoomTransition {
    /// Waiting → Playing, stamping the start time.
    Start {
        /// Game start time.
        at: SystemTime,
    },
    /// Playing → Settling, the durable settlement-in-progress marker.
    BeginSettlement,
    /// Settling → Finished, stamping the end time.
    Finish {
        /// Settlement time.
        at: SystemTime,
    },
}

/// Abstraction over the persistence layer for the six score-tracking
/// collections.
///
/// Every method is a single request/response round trip. Multi-document
/// workflows are sequenced in the service layer; the only atomicity this
/// trait promises is per document, which the conditional updates
/// ([`ScoreStore::claim_room_seat`], [`ScoreStore::transition_room`], the
/// increments) lean on.
pub trait ScoreStore: Send + Sync {
    /// Look up a user by platform identity token.
    fn find_user_by_identity(
        &self,
        identity: IdentityToken,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;

    /// Insert a freshly created user row.
    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Rewrite a user's profile fields, leaving counters untouched.
    fn update_user_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Atomically increment a user's aggregate counters.
    fn apply_user_result(
        &self,
        id: Uuid,
        delta: UserResultDelta,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Insert a freshly created room row.
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Point lookup of a room by id.
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;

    /// Look up the waiting room holding `code`, if any.
    fn find_waiting_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;

    /// Reserve one seat: increment `player_count` iff the room is waiting and
    /// below capacity. Returns whether the seat was claimed.
    fn claim_room_seat(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Apply a conditional status transition. Returns whether the room
    /// matched the transition's source status.
    fn transition_room(
        &self,
        room_id: Uuid,
        transition: RoomTransition,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Insert a membership row.
    fn insert_room_player(
        &self,
        player: RoomPlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Look up a user's active membership row in a room.
    fn find_active_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoomPlayerEntity>>>;

    /// Active membership rows of a room, ordered by join time ascending.
    fn list_active_players(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomPlayerEntity>>>;

    /// Atomically add `amount` to a membership row's running score.
    fn add_to_player_score(
        &self,
        player_id: Uuid,
        amount: i64,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Append a ledger entry.
    fn insert_score_record(
        &self,
        record: ScoreRecordEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// All ledger entries of a room, newest first.
    fn list_score_records(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreRecordEntity>>>;

    /// Back-fill `game_id` on every ledger entry of the room that does not
    /// reference a game yet. Returns the number of rewritten rows.
    fn attach_records_to_game(
        &self,
        room_id: Uuid,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// Insert a game snapshot row.
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Look up the game snapshot settled from a room, if any.
    fn find_game_by_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Batch point lookup of game snapshots by id set.
    fn load_games(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;

    /// Insert a per-participant outcome row unless one already exists for the
    /// same `(game_id, user_id)`. Returns whether the row was created.
    fn insert_game_player_if_absent(
        &self,
        player: GamePlayerEntity,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// A user's outcome rows, newest first, paginated.
    fn list_results_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<GamePlayerEntity>>>;

    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
