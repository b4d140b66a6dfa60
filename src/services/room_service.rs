//! Room lifecycle: creation, joining, roster, start.

use std::time::SystemTime;

use rand::{Rng, rng};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        RoomTransition,
        models::{PlayerStatus, RoomEntity, RoomPlayerEntity, RoomStatus, UserEntity},
    },
    dto::validation::validate_room_code,
    error::ServiceError,
    services::identity_service,
    session::Session,
};

/// Mode tag applied when the caller does not pick one.
pub const DEFAULT_MODE: &str = "multi";

fn generate_room_code() -> String {
    rng().random_range(100_000..=999_999).to_string()
}

fn membership(
    room: &RoomEntity,
    user: &UserEntity,
    is_owner: bool,
    joined_at: SystemTime,
) -> RoomPlayerEntity {
    RoomPlayerEntity {
        id: Uuid::new_v4(),
        room_id: room.id,
        user_id: user.id,
        identity: user.identity.clone(),
        display_name: user.display_name.clone(),
        avatar_url: user.avatar_url.clone(),
        score: 0,
        is_owner,
        status: PlayerStatus::Active,
        joined_at,
    }
}

/// Open a new room with the caller as owner and sole seated player.
///
/// The code is drawn at random and checked against waiting rooms, retrying up
/// to the configured bound so two open rooms never share a code.
pub async fn create_room(session: &Session, mode: &str) -> Result<RoomEntity, ServiceError> {
    let user = identity_service::require_user(session).await?;

    let attempts = session.config().room_code_attempts();
    let mut code = None;
    for _ in 0..attempts {
        let candidate = generate_room_code();
        if session
            .store()
            .find_waiting_room_by_code(candidate.clone())
            .await?
            .is_none()
        {
            code = Some(candidate);
            break;
        }
    }
    let Some(code) = code else {
        warn!(attempts, "room code generation kept colliding");
        return Err(ServiceError::CodeSpaceExhausted { attempts });
    };

    let now = SystemTime::now();
    let room = RoomEntity {
        id: Uuid::new_v4(),
        code,
        owner_id: user.id,
        owner_name: user.display_name.clone(),
        mode: mode.to_owned(),
        status: RoomStatus::Waiting,
        player_count: 1,
        capacity: session.config().room_capacity(),
        created_at: now,
        started_at: None,
        ended_at: None,
    };

    session.store().insert_room(room.clone()).await?;
    session
        .store()
        .insert_room_player(membership(&room, &user, true, now))
        .await?;

    info!(room_id = %room.id, code = %room.code, mode = %room.mode, "created room");
    Ok(room)
}

/// Seat the caller in the waiting room holding `code`.
///
/// Re-joining a room the caller is already seated in returns the room
/// unchanged. The fullness check and the player-count increment are one
/// conditional store update, so concurrent joins cannot overshoot capacity.
pub async fn join_room(session: &Session, code: &str) -> Result<RoomEntity, ServiceError> {
    validate_room_code(code).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let user = identity_service::require_user(session).await?;

    let Some(mut room) = session
        .store()
        .find_waiting_room_by_code(code.to_owned())
        .await?
    else {
        return Err(ServiceError::RoomNotFound(format!(
            "no waiting room holds code `{code}`"
        )));
    };

    if session
        .store()
        .find_active_player(room.id, user.id)
        .await?
        .is_some()
    {
        return Ok(room);
    }

    if !session.store().claim_room_seat(room.id).await? {
        // The claim also fails when the room stopped waiting since the
        // lookup; re-read to report the right refusal.
        return match session.store().find_room(room.id).await? {
            Some(current) if current.status == RoomStatus::Waiting => {
                Err(ServiceError::RoomFull { code: current.code })
            }
            _ => Err(ServiceError::RoomNotFound(format!(
                "no waiting room holds code `{code}`"
            ))),
        };
    }

    session
        .store()
        .insert_room_player(membership(&room, &user, false, SystemTime::now()))
        .await?;
    room.player_count += 1;

    info!(room_id = %room.id, user_id = %user.id, "joined room");
    Ok(room)
}

/// Active players of a room in join order, which is the turn and display
/// order.
pub async fn list_players(
    session: &Session,
    room_id: Uuid,
) -> Result<Vec<RoomPlayerEntity>, ServiceError> {
    Ok(session.store().list_active_players(room_id).await?)
}

/// Move a waiting room into play, stamping the start time.
///
/// Only the owner may start; a room that is no longer waiting is refused.
pub async fn start_game(session: &Session, room_id: Uuid) -> Result<(), ServiceError> {
    let user = identity_service::require_user(session).await?;

    let Some(room) = session.store().find_room(room_id).await? else {
        return Err(ServiceError::RoomNotFound(format!(
            "room `{room_id}` not found"
        )));
    };
    if room.owner_id != user.id {
        return Err(ServiceError::NotOwner { room_id });
    }

    let started = session
        .store()
        .transition_room(
            room_id,
            RoomTransition::Start {
                at: SystemTime::now(),
            },
        )
        .await?;
    if !started {
        return Err(ServiceError::InvalidState(format!(
            "room `{}` is not waiting",
            room.code
        )));
    }

    info!(room_id = %room_id, code = %room.code, "game started");
    Ok(())
}
