use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        common::Identity,
        game::{
            BoardChargeRequest, PointsRequest, RotationRequest, SelectionRequest,
            StartGameRequest,
        },
        slot::SlotView,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Game entry on the slot opened on the caller's device. Every route answers
/// with the updated slot view.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/slots/{id}/selection", put(set_selection))
        .route("/slots/{id}/selection/{name}/toggle", post(toggle_selection))
        .route("/slots/{id}/game/start", post(start_game))
        .route("/slots/{id}/game/players/{name}/points", put(set_points))
        .route("/slots/{id}/game/players/{name}/drop", post(drop_player))
        .route("/slots/{id}/game/rotation", put(set_rotation))
        .route("/slots/{id}/game/board-charge", put(set_board_charge))
        .route("/slots/{id}/game/settle", post(settle))
        .route("/slots/{id}/game/cancel", post(cancel))
        .route("/slots/{id}/games/{game_id}/edit", post(begin_edit))
}

/// Replace the players selected for the next game.
#[utoipa::path(
    put,
    path = "/slots/{id}/selection",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot")
    ),
    request_body = SelectionRequest,
    responses(
        (status = 200, description = "Selection updated", body = SlotView),
        (status = 400, description = "Unknown or duplicated player")
    )
)]
pub async fn set_selection(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SelectionRequest>>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(
        game_service::set_selection(&state, &identity, id, payload).await?,
    ))
}

/// Add a roster player to the selection or take them out of it.
#[utoipa::path(
    post,
    path = "/slots/{id}/selection/{name}/toggle",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot"),
        ("name" = String, Path, description = "Roster name")
    ),
    responses((status = 200, description = "Selection updated", body = SlotView))
)]
pub async fn toggle_selection(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(
        game_service::toggle_selection(&state, &identity, id, name).await?,
    ))
}

/// Start entering a new game with the selected players.
#[utoipa::path(
    post,
    path = "/slots/{id}/game/start",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot")
    ),
    request_body = StartGameRequest,
    responses(
        (status = 200, description = "Game started", body = SlotView),
        (status = 400, description = "Fewer than two selected players"),
        (status = 409, description = "Another game is being entered or is unsettled")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<StartGameRequest>>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(
        game_service::start_game(&state, &identity, id, payload).await?,
    ))
}

/// Enter the points lost by a player.
#[utoipa::path(
    put,
    path = "/slots/{id}/game/players/{name}/points",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot"),
        ("name" = String, Path, description = "Player name")
    ),
    request_body = PointsRequest,
    responses(
        (status = 200, description = "Points recorded", body = SlotView),
        (status = 400, description = "Unknown or dropped player")
    )
)]
pub async fn set_points(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path((id, name)): Path<(Uuid, String)>,
    Valid(Json(payload)): Valid<Json<PointsRequest>>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(
        game_service::set_points(&state, &identity, id, name, payload).await?,
    ))
}

/// Drop a player from the game being entered.
#[utoipa::path(
    post,
    path = "/slots/{id}/game/players/{name}/drop",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot"),
        ("name" = String, Path, description = "Player name")
    ),
    responses(
        (status = 200, description = "Player dropped", body = SlotView),
        (status = 400, description = "Drop refused")
    )
)]
pub async fn drop_player(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(
        game_service::drop_player(&state, &identity, id, name).await?,
    ))
}

/// Mark or unmark the game being entered as a rotation game.
#[utoipa::path(
    put,
    path = "/slots/{id}/game/rotation",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot")
    ),
    request_body = RotationRequest,
    responses((status = 200, description = "Rotation flag updated", body = SlotView))
)]
pub async fn set_rotation(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RotationRequest>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(
        game_service::set_rotation(&state, &identity, id, payload).await?,
    ))
}

/// Change the board charge of the game being entered.
#[utoipa::path(
    put,
    path = "/slots/{id}/game/board-charge",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot")
    ),
    request_body = BoardChargeRequest,
    responses((status = 200, description = "Board charge updated", body = SlotView))
)]
pub async fn set_board_charge(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<BoardChargeRequest>>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(
        game_service::set_board_charge(&state, &identity, id, payload).await?,
    ))
}

/// Settle the game being entered, or save the edited game.
#[utoipa::path(
    post,
    path = "/slots/{id}/game/settle",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot")
    ),
    responses(
        (status = 200, description = "Game written", body = SlotView),
        (status = 400, description = "Entries cannot be settled"),
        (status = 503, description = "Storage unavailable or write timed out")
    )
)]
pub async fn settle(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(game_service::settle(&state, &identity, id).await?))
}

/// Discard the game being entered or the edit.
#[utoipa::path(
    post,
    path = "/slots/{id}/game/cancel",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot")
    ),
    responses((status = 200, description = "Entry discarded", body = SlotView))
)]
pub async fn cancel(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(game_service::cancel(&state, &identity, id).await?))
}

/// Re-open the most recently settled game for correction.
#[utoipa::path(
    post,
    path = "/slots/{id}/games/{game_id}/edit",
    tag = "game",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot"),
        ("game_id" = String, Path, description = "Identifier of the game to edit")
    ),
    responses(
        (status = 200, description = "Game re-opened", body = SlotView),
        (status = 409, description = "Game is not the most recently settled one")
    )
)]
pub async fn begin_edit(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path((id, game_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(
        game_service::begin_edit(&state, &identity, id, game_id).await?,
    ))
}
