//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::config::MIN_GRID_SIZE;

/// Upper bound accepted on the wire; the configured maximum is checked by the service.
pub const MAX_WIRE_GRID_SIZE: usize = 16;

/// Validates a player name: not blank and free of control characters.
///
/// ```ignore
/// validate_display_name("DJ Ada")  // Ok
/// validate_display_name("   ")     // Err - blank
/// validate_display_name("a\u{7}b") // Err - control character
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must contain at least one visible character".into());
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("name_format");
        err.message = Some("Name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a requested grid side length against the wire bounds.
pub fn validate_grid_size(size: usize) -> Result<(), ValidationError> {
    if !(MIN_GRID_SIZE..=MAX_WIRE_GRID_SIZE).contains(&size) {
        let mut err = ValidationError::new("grid_size_range");
        err.message = Some(
            format!(
                "Grid size must be between {MIN_GRID_SIZE} and {MAX_WIRE_GRID_SIZE} (got {size})"
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert!(validate_display_name("DJ Ada").is_ok());
        assert!(validate_display_name("🎧").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name("a\nb").is_err());
    }

    #[test]
    fn grid_sizes() {
        assert!(validate_grid_size(2).is_ok());
        assert!(validate_grid_size(4).is_ok());
        assert!(validate_grid_size(16).is_ok());
        assert!(validate_grid_size(1).is_err());
        assert!(validate_grid_size(17).is_err());
    }
}
