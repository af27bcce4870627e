use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::SlotPhase;

/// Game entry phase of a slot as exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleSlotPhase {
    /// No game in progress and nobody selected.
    NoActiveGame,
    /// Players are being selected for the next game.
    Setup,
    /// A game is being entered.
    Active,
    /// A settled game is being corrected.
    Editing,
}

impl From<SlotPhase> for VisibleSlotPhase {
    fn from(value: SlotPhase) -> Self {
        match value {
            SlotPhase::NoActiveGame => VisibleSlotPhase::NoActiveGame,
            SlotPhase::Setup => VisibleSlotPhase::Setup,
            SlotPhase::Active => VisibleSlotPhase::Active,
            SlotPhase::Editing => VisibleSlotPhase::Editing,
        }
    }
}
