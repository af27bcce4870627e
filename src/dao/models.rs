use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Dated container for an ordered sequence of games.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotEntity {
    /// Stable identifier for the slot.
    pub id: Uuid,
    /// Sequence number of the slot among the owner's slots sharing the same date.
    pub slot_number: u32,
    /// Calendar date (`YYYY-MM-DD`, UTC) the slot was created on.
    pub date: String,
    /// Creation timestamp, used to order slots.
    pub created_at: SystemTime,
    /// Display name of the user who created the slot.
    pub owner_name: String,
    /// Value recorded for dropped players when the slot was created.
    pub drop_value: u32,
}

/// Named player from the user's reusable roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterPlayerEntity {
    /// Stable identifier for the roster entry.
    pub id: Uuid,
    /// Display name, unique per user (case-insensitive).
    pub name: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Participation of a player in a single game. Players are referenced by name,
/// never by roster id, so roster removals do not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GamePlayerEntity {
    /// Roster name at the time the game was played.
    pub name: String,
    /// Signed settlement score (winner positive, losers negative, dropped zero).
    pub score: i64,
    /// Whether the player left the game before settlement.
    #[serde(default)]
    pub dropped: bool,
}

/// Game record persisted under its slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Identifier of the owning slot.
    pub slot_id: Uuid,
    /// Sequential number of the game inside its slot, starting at 1.
    pub game_number: u32,
    /// Participants in display order.
    pub players: Vec<GamePlayerEntity>,
    /// Name of the winner once settled.
    pub winner_player_name: Option<String>,
    /// Gross sum of the points lost by every loser.
    pub points_transferred: i64,
    /// Deduction applied to the winner's takings.
    pub board_charge: u32,
    /// Display-only marker for rotation games.
    #[serde(default)]
    pub is_rotation_game: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Settlement timestamp; `None` while the game is still active.
    pub ended_at: Option<SystemTime>,
}

impl GameEntity {
    /// A game without an end timestamp is still active.
    pub fn is_settled(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Names of every participant, dropped players included.
    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }
}
