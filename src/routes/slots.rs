use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        common::Identity,
        slot::{CreateSlotRequest, DeleteSlotQuery, SlotSummary, SlotView},
    },
    error::AppError,
    services::{game_service, slot_service, workspace_service},
    state::SharedState,
};

/// Slot listing, lifecycle and opening.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/slots", get(list_slots).post(create_slot))
        .route("/slots/{id}", get(get_slot_view).delete(delete_slot))
        .route("/slots/{id}/open", post(open_slot))
}

/// List the caller's slots, newest first.
#[utoipa::path(
    get,
    path = "/slots",
    tag = "slots",
    params(("X-User-Id" = String, Header, description = "Identifier of the caller")),
    responses((status = 200, description = "Slots of the caller", body = [SlotSummary]))
)]
pub async fn list_slots(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<SlotSummary>>, AppError> {
    Ok(Json(slot_service::list_slots(&state, &identity).await?))
}

/// Create a slot dated today.
#[utoipa::path(
    post,
    path = "/slots",
    tag = "slots",
    params(("X-User-Id" = String, Header, description = "Identifier of the caller")),
    request_body = CreateSlotRequest,
    responses(
        (status = 201, description = "Slot created", body = SlotSummary),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_slot(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Valid(Json(payload)): Valid<Json<CreateSlotRequest>>,
) -> Result<(StatusCode, Json<SlotSummary>), AppError> {
    let slot = slot_service::create_slot(&state, &identity, payload).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

/// Delete a slot together with all of its games.
#[utoipa::path(
    delete,
    path = "/slots/{id}",
    tag = "slots",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("id" = String, Path, description = "Identifier of the slot to delete"),
        DeleteSlotQuery
    ),
    responses(
        (status = 204, description = "Slot deleted"),
        (status = 400, description = "Deletion not confirmed"),
        (status = 404, description = "Slot not found")
    )
)]
pub async fn delete_slot(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteSlotQuery>,
) -> Result<StatusCode, AppError> {
    slot_service::delete_slot(&state, &identity, id, query.confirm).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Open a slot on the caller's device and follow its games live.
#[utoipa::path(
    post,
    path = "/slots/{id}/open",
    tag = "slots",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("X-Device-Id" = Option<String>, Header, description = "Device of the caller"),
        ("id" = String, Path, description = "Identifier of the slot to open")
    ),
    responses(
        (status = 200, description = "Slot opened", body = SlotView),
        (status = 404, description = "Slot not found")
    )
)]
pub async fn open_slot(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(workspace_service::open_slot(&state, &identity, id).await?))
}

/// Current view of the slot opened on the caller's device.
#[utoipa::path(
    get,
    path = "/slots/{id}",
    tag = "slots",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("X-Device-Id" = Option<String>, Header, description = "Device of the caller"),
        ("id" = String, Path, description = "Identifier of the opened slot")
    ),
    responses(
        (status = 200, description = "Slot view", body = SlotView),
        (status = 409, description = "Slot is not open on this device")
    )
)]
pub async fn get_slot_view(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlotView>, AppError> {
    Ok(Json(game_service::slot_view(&state, &identity, id).await?))
}
