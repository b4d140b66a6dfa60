use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::IndexOptions,
};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoGameDocument, MongoGamePlayerDocument, MongoRoomDocument, MongoRoomPlayerDocument,
        MongoScoreRecordDocument, MongoUserDocument, doc_id, uuid_as_binary,
    },
};
use crate::dao::{
    ProfileUpdate, RoomTransition, ScoreStore, UserResultDelta,
    models::{
        GameEntity, GamePlayerEntity, IdentityToken, RoomEntity, RoomPlayerEntity,
        ScoreRecordEntity, UserEntity,
    },
    storage::StorageResult,
};

const USER_COLLECTION: &str = "users";
const ROOM_COLLECTION: &str = "rooms";
const ROOM_PLAYER_COLLECTION: &str = "room_players";
const SCORE_RECORD_COLLECTION: &str = "score_records";
const GAME_COLLECTION: &str = "games";
const GAME_PLAYER_COLLECTION: &str = "game_players";

/// MongoDB-backed [`ScoreStore`].
///
/// One typed collection per logical collection of the data model. All
/// conditional operations are expressed as guarded `update_one` filters so
/// the server applies check and write atomically on the document.
#[derive(Clone)]
pub struct MongoScoreStore {
    database: Database,
}

impl MongoScoreStore {
    /// Establish a connection and ensure the indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self { database };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        self.ensure_index(
            USER_COLLECTION,
            "user_identity_idx",
            doc! {"identity": 1},
            true,
        )
        .await?;
        self.ensure_index(
            ROOM_COLLECTION,
            "room_code_status_idx",
            doc! {"code": 1, "status": 1},
            false,
        )
        .await?;
        self.ensure_index(
            ROOM_PLAYER_COLLECTION,
            "room_player_room_idx",
            doc! {"room_id": 1, "status": 1},
            false,
        )
        .await?;
        self.ensure_index(
            SCORE_RECORD_COLLECTION,
            "score_record_room_idx",
            doc! {"room_id": 1, "game_id": 1},
            false,
        )
        .await?;
        // The if-absent outcome insert relies on this unique constraint.
        self.ensure_index(
            GAME_PLAYER_COLLECTION,
            "game_player_game_idx",
            doc! {"game_id": 1, "user_id": 1},
            true,
        )
        .await?;
        self.ensure_index(
            GAME_PLAYER_COLLECTION,
            "game_player_history_idx",
            doc! {"user_id": 1, "created_at": -1},
            false,
        )
        .await
    }

    async fn ensure_index(
        &self,
        collection: &'static str,
        index: &'static str,
        keys: Document,
        unique: bool,
    ) -> MongoResult<()> {
        let model = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(Some(index.to_owned()))
                    .unique(unique.then_some(true))
                    .build(),
            )
            .build();

        self.database
            .collection::<Document>(collection)
            .create_index(model)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection,
                index,
                source,
            })?;

        Ok(())
    }

    fn users(&self) -> Collection<MongoUserDocument> {
        self.database.collection(USER_COLLECTION)
    }

    fn rooms(&self) -> Collection<MongoRoomDocument> {
        self.database.collection(ROOM_COLLECTION)
    }

    fn room_players(&self) -> Collection<MongoRoomPlayerDocument> {
        self.database.collection(ROOM_PLAYER_COLLECTION)
    }

    fn score_records(&self) -> Collection<MongoScoreRecordDocument> {
        self.database.collection(SCORE_RECORD_COLLECTION)
    }

    fn games(&self) -> Collection<MongoGameDocument> {
        self.database.collection(GAME_COLLECTION)
    }

    fn game_players(&self) -> Collection<MongoGamePlayerDocument> {
        self.database.collection(GAME_PLAYER_COLLECTION)
    }

    async fn find_user_by_identity(
        &self,
        identity: IdentityToken,
    ) -> MongoResult<Option<UserEntity>> {
        let document = self
            .users()
            .find_one(doc! {"identity": identity.as_str()})
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: USER_COLLECTION,
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn insert_user(&self, user: UserEntity) -> MongoResult<()> {
        let document: MongoUserDocument = user.into();
        self.users()
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: USER_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn update_user_profile(&self, id: Uuid, update: ProfileUpdate) -> MongoResult<()> {
        self.users()
            .update_one(
                doc_id(id),
                doc! {"$set": {
                    "display_name": update.display_name,
                    "avatar_url": update.avatar_url,
                    "updated_at": DateTime::from_system_time(update.updated_at),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: USER_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn apply_user_result(&self, id: Uuid, delta: UserResultDelta) -> MongoResult<()> {
        self.users()
            .update_one(
                doc_id(id),
                doc! {
                    "$inc": {
                        "games_played": i64::from(delta.games_played),
                        "games_won": i64::from(delta.games_won),
                        "total_score": delta.total_score,
                    },
                    "$set": {"updated_at": DateTime::from_system_time(delta.updated_at)},
                },
            )
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: USER_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn insert_room(&self, room: RoomEntity) -> MongoResult<()> {
        let document: MongoRoomDocument = room.into();
        self.rooms()
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: ROOM_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_room(&self, id: Uuid) -> MongoResult<Option<RoomEntity>> {
        let document =
            self.rooms()
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Query {
                    collection: ROOM_COLLECTION,
                    source,
                })?;

        Ok(document.map(Into::into))
    }

    async fn find_waiting_room_by_code(&self, code: String) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .find_one(doc! {"code": code, "status": "waiting"})
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: ROOM_COLLECTION,
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn claim_room_seat(&self, room_id: Uuid) -> MongoResult<bool> {
        let result = self
            .rooms()
            .update_one(
                doc! {
                    "_id": uuid_as_binary(room_id),
                    "status": "waiting",
                    "$expr": {"$lt": ["$player_count", "$capacity"]},
                },
                doc! {"$inc": {"player_count": 1}},
            )
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: ROOM_COLLECTION,
                source,
            })?;

        Ok(result.matched_count > 0)
    }

    async fn transition_room(&self, room_id: Uuid, transition: RoomTransition) -> MongoResult<bool> {
        let (from, update) = match transition {
            RoomTransition::Start { at } => (
                "waiting",
                doc! {"$set": {
                    "status": "playing",
                    "started_at": DateTime::from_system_time(at),
                }},
            ),
            RoomTransition::BeginSettlement => {
                ("playing", doc! {"$set": {"status": "settling"}})
            }
            RoomTransition::Finish { at } => (
                "settling",
                doc! {"$set": {
                    "status": "finished",
                    "ended_at": DateTime::from_system_time(at),
                }},
            ),
        };

        let result = self
            .rooms()
            .update_one(doc! {"_id": uuid_as_binary(room_id), "status": from}, update)
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: ROOM_COLLECTION,
                source,
            })?;

        Ok(result.matched_count > 0)
    }

    async fn insert_room_player(&self, player: RoomPlayerEntity) -> MongoResult<()> {
        let document: MongoRoomPlayerDocument = player.into();
        self.room_players()
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: ROOM_PLAYER_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_active_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> MongoResult<Option<RoomPlayerEntity>> {
        let document = self
            .room_players()
            .find_one(doc! {
                "room_id": uuid_as_binary(room_id),
                "user_id": uuid_as_binary(user_id),
                "status": "active",
            })
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: ROOM_PLAYER_COLLECTION,
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn list_active_players(&self, room_id: Uuid) -> MongoResult<Vec<RoomPlayerEntity>> {
        let documents: Vec<MongoRoomPlayerDocument> = self
            .room_players()
            .find(doc! {"room_id": uuid_as_binary(room_id), "status": "active"})
            .sort(doc! {"joined_at": 1})
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: ROOM_PLAYER_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: ROOM_PLAYER_COLLECTION,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn add_to_player_score(&self, player_id: Uuid, amount: i64) -> MongoResult<()> {
        self.room_players()
            .update_one(doc_id(player_id), doc! {"$inc": {"score": amount}})
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: ROOM_PLAYER_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn insert_score_record(&self, record: ScoreRecordEntity) -> MongoResult<()> {
        let document: MongoScoreRecordDocument = record.into();
        self.score_records()
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: SCORE_RECORD_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn list_score_records(&self, room_id: Uuid) -> MongoResult<Vec<ScoreRecordEntity>> {
        let documents: Vec<MongoScoreRecordDocument> = self
            .score_records()
            .find(doc! {"room_id": uuid_as_binary(room_id)})
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: SCORE_RECORD_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: SCORE_RECORD_COLLECTION,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn attach_records_to_game(&self, room_id: Uuid, game_id: Uuid) -> MongoResult<u64> {
        // One multi-document update instead of a write per record; rows
        // already tagged by an interrupted settlement are filtered out.
        let result = self
            .score_records()
            .update_many(
                doc! {"room_id": uuid_as_binary(room_id), "game_id": null},
                doc! {"$set": {"game_id": uuid_as_binary(game_id)}},
            )
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: SCORE_RECORD_COLLECTION,
                source,
            })?;

        Ok(result.modified_count)
    }

    async fn insert_game(&self, game: GameEntity) -> MongoResult<()> {
        let document: MongoGameDocument = game.into();
        self.games()
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: GAME_COLLECTION,
                source,
            })?;
        Ok(())
    }

    async fn find_game_by_room(&self, room_id: Uuid) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .find_one(doc! {"room_id": uuid_as_binary(room_id)})
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: GAME_COLLECTION,
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn load_games(&self, ids: Vec<Uuid>) -> MongoResult<Vec<GameEntity>> {
        let ids: Vec<_> = ids.into_iter().map(uuid_as_binary).collect();
        let documents: Vec<MongoGameDocument> = self
            .games()
            .find(doc! {"_id": {"$in": ids}})
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: GAME_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: GAME_COLLECTION,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_game_player_if_absent(&self, player: GamePlayerEntity) -> MongoResult<bool> {
        let game_id = player.game_id;
        let user_id = player.user_id;
        let document: MongoGamePlayerDocument = player.into();
        let on_insert = mongodb::bson::serialize_to_document(&document).map_err(|source| {
            MongoDaoError::Encode {
                collection: GAME_PLAYER_COLLECTION,
                source,
            }
        })?;

        let result = self
            .game_players()
            .update_one(
                doc! {
                    "game_id": uuid_as_binary(game_id),
                    "user_id": uuid_as_binary(user_id),
                },
                doc! {"$setOnInsert": on_insert},
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: GAME_PLAYER_COLLECTION,
                source,
            })?;

        Ok(result.upserted_id.is_some())
    }

    async fn list_results_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> MongoResult<Vec<GamePlayerEntity>> {
        let documents: Vec<MongoGamePlayerDocument> = self
            .game_players()
            .find(doc! {"user_id": uuid_as_binary(user_id)})
            .sort(doc! {"created_at": -1, "rank": 1})
            .skip(offset)
            .limit(limit as i64)
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: GAME_PLAYER_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: GAME_PLAYER_COLLECTION,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn ping(&self) -> MongoResult<()> {
        self.database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }
}

impl ScoreStore for MongoScoreStore {
    fn find_user_by_identity(
        &self,
        identity: IdentityToken,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user_by_identity(identity).await.map_err(Into::into) })
    }

    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_user(user).await.map_err(Into::into) })
    }

    fn update_user_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update_user_profile(id, update).await.map_err(Into::into) })
    }

    fn apply_user_result(
        &self,
        id: Uuid,
        delta: UserResultDelta,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.apply_user_result(id, delta).await.map_err(Into::into) })
    }

    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room(room).await.map_err(Into::into) })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(id).await.map_err(Into::into) })
    }

    fn find_waiting_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_waiting_room_by_code(code)
                .await
                .map_err(Into::into)
        })
    }

    fn claim_room_seat(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.claim_room_seat(room_id).await.map_err(Into::into) })
    }

    fn transition_room(
        &self,
        room_id: Uuid,
        transition: RoomTransition,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .transition_room(room_id, transition)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_room_player(
        &self,
        player: RoomPlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room_player(player).await.map_err(Into::into) })
    }

    fn find_active_player(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoomPlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_active_player(room_id, user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_active_players(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomPlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_active_players(room_id).await.map_err(Into::into) })
    }

    fn add_to_player_score(
        &self,
        player_id: Uuid,
        amount: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .add_to_player_score(player_id, amount)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_score_record(
        &self,
        record: ScoreRecordEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_score_record(record).await.map_err(Into::into) })
    }

    fn list_score_records(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_score_records(room_id).await.map_err(Into::into) })
    }

    fn attach_records_to_game(
        &self,
        room_id: Uuid,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .attach_records_to_game(room_id, game_id)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_game(game).await.map_err(Into::into) })
    }

    fn find_game_by_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game_by_room(room_id).await.map_err(Into::into) })
    }

    fn load_games(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_games(ids).await.map_err(Into::into) })
    }

    fn insert_game_player_if_absent(
        &self,
        player: GamePlayerEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert_game_player_if_absent(player)
                .await
                .map_err(Into::into)
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
            store
                .list_results_for_user(user_id, limit, offset)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
