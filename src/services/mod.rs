/// Per-user game history.
pub mod history_service;
/// Identity resolution and profile persistence.
pub mod identity_service;
/// Room lifecycle: creation, joining, roster, start.
pub mod room_service;
/// Score transfer recording.
pub mod score_service;
/// End-of-game settlement.
pub mod settlement_service;
