use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Opaque per-caller token handed out by the hosting platform's identity
/// provider. The store scopes "my documents" queries by it; this crate never
/// inspects or mints one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityToken(String);

impl IdentityToken {
    /// Wrap a raw platform token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IdentityToken {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Open for joins; the game has not started yet.
    Waiting,
    /// Game in progress; score transfers are being recorded.
    Playing,
    /// Settlement in progress. Durable marker: a crashed settlement can be
    /// resumed from here without repeating completed steps.
    Settling,
    /// Terminal. The room has been settled into a game snapshot.
    Finished,
}

/// Membership status of a player within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    /// Currently seated in the room.
    Active,
    /// Logically removed; the row is kept for bookkeeping.
    Left,
}

/// Account record for one player. Created on first profile save, mutated by
/// settlement, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Primary key of the user.
    pub id: Uuid,
    /// Platform identity token this account is bound to.
    pub identity: IdentityToken,
    /// Display name chosen by the player.
    pub display_name: String,
    /// Avatar image reference.
    pub avatar_url: String,
    /// Number of settled games this user participated in.
    pub games_played: u32,
    /// Number of settled games finished with a positive score.
    pub games_won: u32,
    /// Sum of final scores across all settled games.
    pub total_score: i64,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last profile or counter update.
    pub updated_at: SystemTime,
}

/// A joinable scoring session identified by a short numeric code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Human-shareable 6-digit code, unique among waiting rooms.
    pub code: String,
    /// User who created the room.
    pub owner_id: Uuid,
    /// Owner display name, denormalized at creation time.
    pub owner_name: String,
    /// Free-form mode tag chosen by the creator (e.g. `multi`).
    pub mode: String,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Number of active players. Kept in lock-step with the membership rows
    /// by the conditional seat claim.
    pub player_count: u32,
    /// Maximum number of players.
    pub capacity: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Set when the game starts.
    pub started_at: Option<SystemTime>,
    /// Set when the room is settled.
    pub ended_at: Option<SystemTime>,
}

/// Membership and running score of one user within one room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomPlayerEntity {
    /// Primary key of the membership row.
    pub id: Uuid,
    /// Room this row belongs to.
    pub room_id: Uuid,
    /// The seated user.
    pub user_id: Uuid,
    /// Identity snapshot taken at join time.
    pub identity: IdentityToken,
    /// Display name snapshot taken at join time.
    pub display_name: String,
    /// Avatar snapshot taken at join time.
    pub avatar_url: String,
    /// Running score within the room.
    pub score: i64,
    /// Whether this player created the room.
    pub is_owner: bool,
    /// Membership status.
    pub status: PlayerStatus,
    /// Join timestamp; defines the turn/display order.
    pub joined_at: SystemTime,
}

/// Immutable ledger entry of one point transfer between two players.
///
/// Only `game_id` is ever rewritten: it is back-filled once the room settles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreRecordEntity {
    /// Primary key of the record.
    pub id: Uuid,
    /// Room the transfer happened in.
    pub room_id: Uuid,
    /// Settled game this record belongs to; `None` until settlement.
    pub game_id: Option<Uuid>,
    /// Giving user.
    pub from_user_id: Uuid,
    /// Giver identity snapshot.
    pub from_identity: IdentityToken,
    /// Giver display name snapshot.
    pub from_name: String,
    /// Receiving user.
    pub to_user_id: Uuid,
    /// Receiver identity snapshot.
    pub to_identity: IdentityToken,
    /// Receiver display name snapshot.
    pub to_name: String,
    /// Transferred amount; negative transfers are allowed.
    pub amount: i64,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Settled snapshot of a finished room. Created exactly once per room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Room this game was settled from.
    pub room_id: Uuid,
    /// Room code snapshot.
    pub room_code: String,
    /// Mode tag snapshot.
    pub mode: String,
    /// Room owner snapshot.
    pub owner_id: Uuid,
    /// Owner display name snapshot.
    pub owner_name: String,
    /// Number of participants at settlement time.
    pub player_count: u32,
    /// Whole seconds between game start and settlement.
    pub duration_secs: u64,
    /// Number of score records settled into this game.
    pub record_count: u32,
    /// When the game started.
    pub started_at: SystemTime,
    /// When the game ended (settlement time).
    pub ended_at: SystemTime,
    /// Creation timestamp of the snapshot row.
    pub created_at: SystemTime,
}

/// Per-participant outcome of a settled game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GamePlayerEntity {
    /// Primary key of the outcome row.
    pub id: Uuid,
    /// Settled game this outcome belongs to.
    pub game_id: Uuid,
    /// Room the game was settled from.
    pub room_id: Uuid,
    /// The participant.
    pub user_id: Uuid,
    /// Identity snapshot.
    pub identity: IdentityToken,
    /// Display name snapshot.
    pub display_name: String,
    /// Avatar snapshot.
    pub avatar_url: String,
    /// Final score at settlement.
    pub final_score: i64,
    /// Rank within the game, 1 = highest score.
    pub rank: u32,
    /// Whether the final score was positive.
    pub is_win: bool,
    /// Creation timestamp; history is ordered by it.
    pub created_at: SystemTime,
}
