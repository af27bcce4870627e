use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        common::Identity,
        roster::{CreateRosterPlayerRequest, RosterPlayerSummary},
    },
    error::AppError,
    services::roster_service,
    state::SharedState,
};

/// Reusable roster of the caller.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/roster", get(list_players).post(add_player))
        .route("/roster/{id}", delete(remove_player))
}

/// List roster players sorted by name.
#[utoipa::path(
    get,
    path = "/roster",
    tag = "roster",
    params(("X-User-Id" = String, Header, description = "Identifier of the caller")),
    responses((status = 200, description = "Roster of the caller", body = [RosterPlayerSummary]))
)]
pub async fn list_players(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<RosterPlayerSummary>>, AppError> {
    Ok(Json(roster_service::list_players(&state, &identity).await?))
}

/// Add a player to the roster.
#[utoipa::path(
    post,
    path = "/roster",
    tag = "roster",
    params(("X-User-Id" = String, Header, description = "Identifier of the caller")),
    request_body = CreateRosterPlayerRequest,
    responses(
        (status = 201, description = "Player added", body = RosterPlayerSummary),
        (status = 400, description = "Empty or duplicate name")
    )
)]
pub async fn add_player(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Valid(Json(payload)): Valid<Json<CreateRosterPlayerRequest>>,
) -> Result<(StatusCode, Json<RosterPlayerSummary>), AppError> {
    let player = roster_service::add_player(&state, &identity, payload).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// Remove a player from the roster.
#[utoipa::path(
    delete,
    path = "/roster/{id}",
    tag = "roster",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the roster entry")
    ),
    responses(
        (status = 204, description = "Player removed"),
        (status = 404, description = "Player not found"),
        (status = 409, description = "Player is part of a game being entered")
    )
)]
pub async fn remove_player(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    roster_service::remove_player(&state, &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
