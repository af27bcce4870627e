use std::convert::Infallible;

use axum::{Extension, Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{dto::common::Identity, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse",
    tag = "sse",
    params(
        ("X-User-Id" = String, Header, description = "Identifier of the caller"),
        ("X-Device-Id" = Option<String>, Header, description = "Device of the caller")
    ),
    responses((status = 200, description = "Device event stream", content_type = "text/event-stream", body = String))
)]
/// Stream slot list, roster and opened slot updates to the caller's device.
pub async fn device_stream(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_device(&state, &identity).await;
    info!(owner = %identity.owner, device = %identity.device, "new device SSE connection");
    sse_service::to_sse_stream(receiver, identity.device)
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse", get(device_stream))
}
