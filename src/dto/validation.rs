//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest player name accepted on the roster.
pub const MAX_NAME_LEN: u64 = 64;

/// Rejects names that are empty once surrounding whitespace is removed.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("Alice") // Ok
/// validate_not_blank("   ")   // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must contain at least one visible character".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects lists that name the same entry twice.
pub fn validate_unique_names(names: &[String]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    if let Some(duplicate) = names.iter().find(|name| !seen.insert(name.as_str())) {
        let mut err = ValidationError::new("duplicate");
        err.message = Some(format!("`{duplicate}` is listed more than once").into());
        return Err(err);
    }
    Ok(())
}
