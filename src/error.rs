use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// The operation requires a resolved user and the caller has none.
    #[error("not authenticated")]
    NotAuthenticated,
    /// No room matches the given code or id.
    #[error("room not found: {0}")]
    RoomNotFound(String),
    /// The target player has no active seat in the room.
    #[error("player not found: {0}")]
    PlayerNotFound(String),
    /// The room already seats its maximum number of players.
    #[error("room `{code}` is full")]
    RoomFull {
        /// Code of the full room.
        code: String,
    },
    /// The caller is not the owner of the room.
    #[error("caller does not own room `{room_id}`")]
    NotOwner {
        /// Room whose ownership check failed.
        room_id: Uuid,
    },
    /// The room is not in a status that permits the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Room-code generation kept colliding with waiting rooms.
    #[error("no unused room code found after {attempts} attempt(s)")]
    CodeSpaceExhausted {
        /// Number of candidates tried.
        attempts: u32,
    },
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {}", err))
    }
}
