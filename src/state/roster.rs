use thiserror::Error;

use crate::dao::models::RosterPlayerEntity;

/// Rejections of roster edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("player name cannot be empty")]
    EmptyName,
    #[error("a player named `{0}` already exists")]
    Duplicate(String),
    #[error("player `{0}` is part of a game being entered")]
    InUse(String),
}

/// Trim `raw` and make sure no roster entry already carries that name,
/// ignoring case. Returns the name to store.
pub fn validate_new_name(raw: &str, roster: &[RosterPlayerEntity]) -> Result<String, RosterError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RosterError::EmptyName);
    }

    let lowered = name.to_lowercase();
    if let Some(existing) = roster.iter().find(|p| p.name.to_lowercase() == lowered) {
        return Err(RosterError::Duplicate(existing.name.clone()));
    }

    Ok(name.to_string())
}
