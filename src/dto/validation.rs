//! Validation helpers for caller-supplied values.

use validator::ValidationError;

/// Validates that a room code is exactly 6 ASCII digits in [100000, 999999].
///
/// # Examples
///
/// ```ignore
/// validate_room_code("428713") // Ok
/// validate_room_code("42871")  // Err - too short
/// validate_room_code("042871") // Err - below the code range
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != 6 {
        let mut err = ValidationError::new("room_code_length");
        err.message =
            Some(format!("Room code must be exactly 6 digits (got {})", code.len()).into());
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only digits".into());
        return Err(err);
    }

    if code.starts_with('0') {
        let mut err = ValidationError::new("room_code_range");
        err.message = Some("Room code must be between 100000 and 999999".into());
        return Err(err);
    }

    Ok(())
}
