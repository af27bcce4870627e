use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::RosterPlayerEntity,
    dto::{
        format_system_time,
        validation::{MAX_NAME_LEN, validate_not_blank},
    },
};

/// Payload adding a player to the roster.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRosterPlayerRequest {
    /// Display name; surrounding whitespace is removed.
    #[validate(
        custom(function = "validate_not_blank"),
        length(max = MAX_NAME_LEN)
    )]
    pub name: String,
}

/// Roster entry as returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RosterPlayerSummary {
    pub id: Uuid,
    pub name: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<&RosterPlayerEntity> for RosterPlayerSummary {
    fn from(player: &RosterPlayerEntity) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            created_at: format_system_time(player.created_at),
        }
    }
}
