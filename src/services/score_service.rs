//! Score transfer recording.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::ScoreRecordEntity,
    error::ServiceError,
    services::identity_service,
    session::Session,
};

/// Record a point transfer from the caller to `to_user_id` inside a room.
///
/// Appends a ledger entry (its game reference stays empty until settlement)
/// and then applies the amount to the target's running score as one in-place
/// increment. The two writes are on different documents and are not atomic
/// together: a failure after the insert leaves the ledger entry without the
/// score update. Negative amounts are allowed and decrease the target's
/// score.
pub async fn give_score(
    session: &Session,
    room_id: Uuid,
    to_user_id: Uuid,
    amount: i64,
) -> Result<(), ServiceError> {
    let user = identity_service::require_user(session).await?;

    let Some(target) = session
        .store()
        .find_active_player(room_id, to_user_id)
        .await?
    else {
        return Err(ServiceError::PlayerNotFound(format!(
            "user `{to_user_id}` has no active seat in room `{room_id}`"
        )));
    };

    let record = ScoreRecordEntity {
        id: Uuid::new_v4(),
        room_id,
        game_id: None,
        from_user_id: user.id,
        from_identity: user.identity.clone(),
        from_name: user.display_name.clone(),
        to_user_id,
        to_identity: target.identity.clone(),
        to_name: target.display_name.clone(),
        amount,
        created_at: SystemTime::now(),
    };
    session.store().insert_score_record(record).await?;
    session
        .store()
        .add_to_player_score(target.id, amount)
        .await?;

    info!(room_id = %room_id, to_user_id = %to_user_id, amount, "recorded score transfer");
    Ok(())
}

/// All transfers recorded in a room, newest first.
pub async fn list_records(
    session: &Session,
    room_id: Uuid,
) -> Result<Vec<ScoreRecordEntity>, ServiceError> {
    Ok(session.store().list_score_records(room_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::memory::MemoryScoreStore,
        dao::models::PlayerStatus,
        services::{
            room_service::{self, DEFAULT_MODE},
            testing::signed_in,
        },
    };

    #[tokio::test]
    async fn give_score_accumulates_on_the_target() {
        let store = MemoryScoreStore::new();
        let (owner_session, _) = signed_in(&store, "openid-owner", "Ada").await;
        let room = room_service::create_room(&owner_session, DEFAULT_MODE)
            .await
            .unwrap();
        let (guest_session, guest) = signed_in(&store, "openid-guest", "Grace").await;
        room_service::join_room(&guest_session, &room.code)
            .await
            .unwrap();

        give_score(&owner_session, room.id, guest.id, 12).await.unwrap();
        give_score(&owner_session, room.id, guest.id, 5).await.unwrap();

        let players = room_service::list_players(&owner_session, room.id)
            .await
            .unwrap();
        let target = players.iter().find(|p| p.user_id == guest.id).unwrap();
        assert_eq!(target.score, 17);
        assert_eq!(target.status, PlayerStatus::Active);

        let records = list_records(&owner_session, room.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.game_id.is_none()));
        assert!(records.iter().all(|r| r.to_user_id == guest.id));
    }

    #[tokio::test]
    async fn give_score_allows_negative_amounts() {
        let store = MemoryScoreStore::new();
        let (owner_session, owner) = signed_in(&store, "openid-owner", "Ada").await;
        let room = room_service::create_room(&owner_session, DEFAULT_MODE)
            .await
            .unwrap();
        let (guest_session, _) = signed_in(&store, "openid-guest", "Grace").await;
        room_service::join_room(&guest_session, &room.code)
            .await
            .unwrap();

        give_score(&guest_session, room.id, owner.id, -8).await.unwrap();

        let players = room_service::list_players(&owner_session, room.id)
            .await
            .unwrap();
        let target = players.iter().find(|p| p.user_id == owner.id).unwrap();
        assert_eq!(target.score, -8);
    }

    #[tokio::test]
    async fn give_score_rejects_an_absent_target() {
        let store = MemoryScoreStore::new();
        let (owner_session, _) = signed_in(&store, "openid-owner", "Ada").await;
        let room = room_service::create_room(&owner_session, DEFAULT_MODE)
            .await
            .unwrap();

        let stranger = Uuid::new_v4();
        let result = give_score(&owner_session, room.id, stranger, 10).await;
        assert!(matches!(result, Err(ServiceError::PlayerNotFound(_))));
    }

    #[tokio::test]
    async fn give_score_requires_identity() {
        let store = MemoryScoreStore::new();
        let (owner_session, owner) = signed_in(&store, "openid-owner", "Ada").await;
        let room = room_service::create_room(&owner_session, DEFAULT_MODE)
            .await
            .unwrap();

        let anonymous = crate::services::testing::session(&store, "openid-anon");
        let result = give_score(&anonymous, room.id, owner.id, 10).await;
        assert!(matches!(result, Err(ServiceError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn list_records_returns_newest_first() {
        let store = MemoryScoreStore::new();
        let (owner_session, _) = signed_in(&store, "openid-owner", "Ada").await;
        let room = room_service::create_room(&owner_session, DEFAULT_MODE)
            .await
            .unwrap();
        let (guest_session, guest) = signed_in(&store, "openid-guest", "Grace").await;
        room_service::join_room(&guest_session, &room.code)
            .await
            .unwrap();

        give_score(&owner_session, room.id, guest.id, 1).await.unwrap();
        give_score(&owner_session, room.id, guest.id, 2).await.unwrap();
        give_score(&owner_session, room.id, guest.id, 3).await.unwrap();

        let records = list_records(&owner_session, room.id).await.unwrap();
        let amounts: Vec<i64> = records.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![3, 2, 1]);
    }
}
