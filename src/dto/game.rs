use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameEntity, GamePlayerEntity},
    dto::{format_system_time, validation::validate_unique_names},
    state::{
        session::LocalSession,
        settlement::{self, SessionPlayer},
        standings::Standing,
    },
};

/// Highest number of points a single player can lose in one game.
pub const MAX_POINTS: u32 = 1_000_000;

/// Replace the selection for the next game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SelectionRequest {
    /// Roster names, in display order.
    #[validate(custom(function = "validate_unique_names"))]
    pub players: Vec<String>,
}

/// Options for a new game. Omitted values fall back to the configured defaults.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct StartGameRequest {
    #[serde(default)]
    pub is_rotation_game: Option<bool>,
    #[serde(default)]
    #[validate(range(max = MAX_POINTS))]
    pub board_charge: Option<u32>,
}

/// Points lost by one player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PointsRequest {
    #[validate(range(max = MAX_POINTS))]
    pub points: u32,
}

/// New value of the rotation marker.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RotationRequest {
    pub value: bool,
}

/// New board charge of the game being entered.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BoardChargeRequest {
    #[validate(range(max = MAX_POINTS))]
    pub value: u32,
}

/// Stored participation of a player in a game.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GamePlayerSummary {
    pub name: String,
    pub score: i64,
    pub dropped: bool,
}

impl From<&GamePlayerEntity> for GamePlayerSummary {
    fn from(player: &GamePlayerEntity) -> Self {
        Self {
            name: player.name.clone(),
            score: player.score,
            dropped: player.dropped,
        }
    }
}

/// Game record as listed in the slot history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSummary {
    pub id: Uuid,
    pub game_number: u32,
    pub players: Vec<GamePlayerSummary>,
    pub winner_player_name: Option<String>,
    pub points_transferred: i64,
    pub board_charge: u32,
    pub is_rotation_game: bool,
    pub created_at: String,
    /// RFC 3339 settlement time; absent while the game is unsettled.
    pub ended_at: Option<String>,
}

impl From<&GameEntity> for GameSummary {
    fn from(game: &GameEntity) -> Self {
        Self {
            id: game.id,
            game_number: game.game_number,
            players: game.players.iter().map(Into::into).collect(),
            winner_player_name: game.winner_player_name.clone(),
            points_transferred: game.points_transferred,
            board_charge: game.board_charge,
            is_rotation_game: game.is_rotation_game,
            created_at: format_system_time(game.created_at),
            ended_at: game.ended_at.map(format_system_time),
        }
    }
}

/// Entry of a player in the game being entered.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionPlayerView {
    pub name: String,
    pub points_lost: u32,
    pub dropped: bool,
}

impl From<&SessionPlayer> for SessionPlayerView {
    fn from(player: &SessionPlayer) -> Self {
        Self {
            name: player.name.clone(),
            points_lost: player.points_lost,
            dropped: player.dropped,
        }
    }
}

/// Game being entered or edited on this device.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionView {
    pub game_number: u32,
    /// True when a settled game is being corrected.
    pub editing: bool,
    /// Stored game being resumed or edited, if any.
    pub game_id: Option<Uuid>,
    pub is_rotation_game: bool,
    pub board_charge: u32,
    pub players: Vec<SessionPlayerView>,
    /// Single active player with 0 points while everybody else has entered theirs.
    pub designated_winner: Option<String>,
    /// Whether settlement would currently succeed.
    pub can_settle: bool,
}

impl From<&LocalSession> for SessionView {
    fn from(session: &LocalSession) -> Self {
        use crate::state::session::SessionKind;

        let game_id = match &session.kind {
            SessionKind::Pending { resumed_game } => *resumed_game,
            SessionKind::Editing { original } => Some(original.id),
        };
        Self {
            game_number: session.game_number,
            editing: session.is_editing(),
            game_id,
            is_rotation_game: session.is_rotation,
            board_charge: session.board_charge,
            players: session.players.iter().map(Into::into).collect(),
            designated_winner: settlement::designated_winner(&session.players)
                .map(str::to_owned),
            can_settle: settlement::settle(&session.players, session.board_charge).is_ok(),
        }
    }
}

/// Running total of one player over the slot's settled games.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StandingSummary {
    pub name: String,
    pub total: i64,
    pub games_played: u32,
    pub wins: u32,
}

impl From<Standing> for StandingSummary {
    fn from(standing: Standing) -> Self {
        Self {
            name: standing.name,
            total: standing.total,
            games_played: standing.games_played,
            wins: standing.wins,
        }
    }
}
