use serde::Serialize;

use crate::dao::models::{GameEntity, GamePlayerEntity};

/// Outcome of one settled game from the perspective of one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    /// The player finished with a positive score.
    Win,
    /// The player finished at zero or below.
    Lose,
}

impl GameResult {
    /// Derive the result from the stored win flag.
    pub fn from_win(is_win: bool) -> Self {
        if is_win { GameResult::Win } else { GameResult::Lose }
    }
}

/// One page entry of a user's game history: the player's outcome row merged
/// with the game snapshot it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// The caller's outcome in the game.
    pub player: GamePlayerEntity,
    /// The settled game snapshot.
    pub game: GameEntity,
    /// Derived win/lose marker.
    pub result: GameResult,
}
