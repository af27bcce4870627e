use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Tally Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::slots::list_slots,
        crate::routes::slots::create_slot,
        crate::routes::slots::delete_slot,
        crate::routes::slots::open_slot,
        crate::routes::slots::get_slot_view,
        crate::routes::game::set_selection,
        crate::routes::game::toggle_selection,
        crate::routes::game::start_game,
        crate::routes::game::set_points,
        crate::routes::game::drop_player,
        crate::routes::game::set_rotation,
        crate::routes::game::set_board_charge,
        crate::routes::game::settle,
        crate::routes::game::cancel,
        crate::routes::game::begin_edit,
        crate::routes::roster::list_players,
        crate::routes::roster::add_player,
        crate::routes::roster::remove_player,
        crate::routes::workspace::close_workspace,
        crate::routes::sse::device_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::ActionResponse,
            crate::dto::phase::VisibleSlotPhase,
            crate::dto::slot::CreateSlotRequest,
            crate::dto::slot::SlotSummary,
            crate::dto::slot::SlotView,
            crate::dto::game::SelectionRequest,
            crate::dto::game::StartGameRequest,
            crate::dto::game::PointsRequest,
            crate::dto::game::RotationRequest,
            crate::dto::game::BoardChargeRequest,
            crate::dto::game::GameSummary,
            crate::dto::game::GamePlayerSummary,
            crate::dto::game::SessionView,
            crate::dto::game::SessionPlayerView,
            crate::dto::game::StandingSummary,
            crate::dto::roster::CreateRosterPlayerRequest,
            crate::dto::roster::RosterPlayerSummary,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::SlotsUpdatedEvent,
            crate::dto::sse::RosterUpdatedEvent,
            crate::dto::sse::InfoEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "slots", description = "Dated slots and opening them on a device"),
        (name = "game", description = "Selecting players, entering and settling games"),
        (name = "roster", description = "Reusable player roster"),
        (name = "workspace", description = "Per-device workspace lifecycle"),
        (name = "sse", description = "Server-sent events stream"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/slots",
            "/slots/{id}/game/settle",
            "/roster/{id}",
            "/sse",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
