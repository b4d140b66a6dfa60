use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, GamePlayerEntity, IdentityToken, PlayerStatus, RoomEntity, RoomPlayerEntity,
    RoomStatus, ScoreRecordEntity, UserEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    identity: IdentityToken,
    display_name: String,
    avatar_url: String,
    games_played: u32,
    games_won: u32,
    total_score: i64,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            identity: value.identity,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
            games_played: value.games_played,
            games_won: value.games_won,
            total_score: value.total_score,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            identity: value.identity,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
            games_played: value.games_played,
            games_won: value.games_won,
            total_score: value.total_score,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    code: String,
    owner_id: Uuid,
    owner_name: String,
    mode: String,
    status: RoomStatus,
    player_count: u32,
    capacity: u32,
    created_at: DateTime,
    started_at: Option<DateTime>,
    ended_at: Option<DateTime>,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            code: value.code,
            owner_id: value.owner_id,
            owner_name: value.owner_name,
            mode: value.mode,
            status: value.status,
            player_count: value.player_count,
            capacity: value.capacity,
            created_at: DateTime::from_system_time(value.created_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            ended_at: value.ended_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            id: value.id,
            code: value.code,
            owner_id: value.owner_id,
            owner_name: value.owner_name,
            mode: value.mode,
            status: value.status,
            player_count: value.player_count,
            capacity: value.capacity,
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(|at| at.to_system_time()),
            ended_at: value.ended_at.map(|at| at.to_system_time()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomPlayerDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    room_id: Uuid,
    user_id: Uuid,
    identity: IdentityToken,
    display_name: String,
    avatar_url: String,
    score: i64,
    is_owner: bool,
    status: PlayerStatus,
    joined_at: DateTime,
}

impl From<RoomPlayerEntity> for MongoRoomPlayerDocument {
    fn from(value: RoomPlayerEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            user_id: value.user_id,
            identity: value.identity,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
            score: value.score,
            is_owner: value.is_owner,
            status: value.status,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl From<MongoRoomPlayerDocument> for RoomPlayerEntity {
    fn from(value: MongoRoomPlayerDocument) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            user_id: value.user_id,
            identity: value.identity,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
            score: value.score,
            is_owner: value.is_owner,
            status: value.status,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoScoreRecordDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    room_id: Uuid,
    game_id: Option<Uuid>,
    from_user_id: Uuid,
    from_identity: IdentityToken,
    from_name: String,
    to_user_id: Uuid,
    to_identity: IdentityToken,
    to_name: String,
    amount: i64,
    created_at: DateTime,
}

impl From<ScoreRecordEntity> for MongoScoreRecordDocument {
    fn from(value: ScoreRecordEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            game_id: value.game_id,
            from_user_id: value.from_user_id,
            from_identity: value.from_identity,
            from_name: value.from_name,
            to_user_id: value.to_user_id,
            to_identity: value.to_identity,
            to_name: value.to_name,
            amount: value.amount,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoScoreRecordDocument> for ScoreRecordEntity {
    fn from(value: MongoScoreRecordDocument) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            game_id: value.game_id,
            from_user_id: value.from_user_id,
            from_identity: value.from_identity,
            from_name: value.from_name,
            to_user_id: value.to_user_id,
            to_identity: value.to_identity,
            to_name: value.to_name,
            amount: value.amount,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    room_id: Uuid,
    room_code: String,
    mode: String,
    owner_id: Uuid,
    owner_name: String,
    player_count: u32,
    duration_secs: u64,
    record_count: u32,
    started_at: DateTime,
    ended_at: DateTime,
    created_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            room_code: value.room_code,
            mode: value.mode,
            owner_id: value.owner_id,
            owner_name: value.owner_name,
            player_count: value.player_count,
            duration_secs: value.duration_secs,
            record_count: value.record_count,
            started_at: DateTime::from_system_time(value.started_at),
            ended_at: DateTime::from_system_time(value.ended_at),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            room_code: value.room_code,
            mode: value.mode,
            owner_id: value.owner_id,
            owner_name: value.owner_name,
            player_count: value.player_count,
            duration_secs: value.duration_secs,
            record_count: value.record_count,
            started_at: value.started_at.to_system_time(),
            ended_at: value.ended_at.to_system_time(),
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGamePlayerDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    game_id: Uuid,
    room_id: Uuid,
    user_id: Uuid,
    identity: IdentityToken,
    display_name: String,
    avatar_url: String,
    final_score: i64,
    rank: u32,
    is_win: bool,
    created_at: DateTime,
}

impl From<GamePlayerEntity> for MongoGamePlayerDocument {
    fn from(value: GamePlayerEntity) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            room_id: value.room_id,
            user_id: value.user_id,
            identity: value.identity,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
            final_score: value.final_score,
            rank: value.rank,
            is_win: value.is_win,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoGamePlayerDocument> for GamePlayerEntity {
    fn from(value: MongoGamePlayerDocument) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            room_id: value.room_id,
            user_id: value.user_id,
            identity: value.identity,
            display_name: value.display_name,
            avatar_url: value.avatar_url,
            final_score: value.final_score,
            rank: value.rank,
            is_win: value.is_win,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
