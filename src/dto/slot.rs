use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::SlotEntity,
    dto::{
        format_system_time,
        game::{GameSummary, MAX_POINTS, SessionView, StandingSummary},
        phase::VisibleSlotPhase,
    },
    state::{board::SlotBoard, standings},
};

/// Payload used to create a new slot.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateSlotRequest {
    /// Value recorded for dropped players. Falls back to the configured default.
    #[serde(default)]
    #[validate(range(max = MAX_POINTS))]
    pub drop_value: Option<u32>,
}

/// Deleting a slot removes all of its games and must be confirmed.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteSlotQuery {
    /// Must be `true` for the deletion to happen.
    #[serde(default)]
    pub confirm: bool,
}

/// Slot as listed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlotSummary {
    pub id: Uuid,
    pub slot_number: u32,
    pub date: String,
    pub created_at: String,
    pub owner_name: String,
    pub drop_value: u32,
}

impl From<&SlotEntity> for SlotSummary {
    fn from(slot: &SlotEntity) -> Self {
        Self {
            id: slot.id,
            slot_number: slot.slot_number,
            date: slot.date.clone(),
            created_at: format_system_time(slot.created_at),
            owner_name: slot.owner_name.clone(),
            drop_value: slot.drop_value,
        }
    }
}

/// Everything a device needs to render the opened slot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlotView {
    pub slot: SlotSummary,
    pub phase: VisibleSlotPhase,
    /// Players chosen for the next game.
    pub selection: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
    /// Stored games, most recent first.
    pub games: Vec<GameSummary>,
    pub standings: Vec<StandingSummary>,
    pub next_game_number: u32,
    /// Game that may currently be re-opened for editing.
    pub editable_game_id: Option<Uuid>,
}

impl From<&SlotBoard> for SlotView {
    fn from(board: &SlotBoard) -> Self {
        Self {
            slot: board.slot().into(),
            phase: board.phase().into(),
            selection: board.selection().to_vec(),
            session: board.session().map(Into::into),
            games: board.games().iter().map(Into::into).collect(),
            standings: standings::compute(board.games())
                .into_iter()
                .map(Into::into)
                .collect(),
            next_game_number: board.next_game_number(),
            editable_game_id: board
                .session()
                .is_none()
                .then(|| board.last_settled_game().map(|g| g.id))
                .flatten(),
        }
    }
}
