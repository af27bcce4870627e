use axum::{Extension, Json, Router, extract::State, routing::delete};

use crate::{
    dto::common::{ActionResponse, Identity},
    services::workspace_service,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/workspace", delete(close_workspace))
}

/// Close the caller's device workspace and stop its live subscriptions.
#[utoipa::path(
    delete,
    path = "/workspace",
    tag = "workspace",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("X-Device-Id" = Option<String>, Header, description = "Device of the caller")
    ),
    responses((status = 200, description = "Workspace closed", body = ActionResponse))
)]
pub async fn close_workspace(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
) -> Json<ActionResponse> {
    let message = if workspace_service::close(&state, &identity).await {
        "workspace closed"
    } else {
        "no workspace was open"
    };
    Json(ActionResponse::new(message))
}
