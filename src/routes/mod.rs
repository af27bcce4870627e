use axum::{Router, middleware};

use crate::state::SharedState;

pub mod docs;
pub mod game;
pub mod health;
pub mod identity;
pub mod roster;
pub mod slots;
pub mod sse;
pub mod workspace;

/// Compose all route trees, wiring in shared state and documentation routes.
///
/// Everything except the health check and the documentation requires the
/// identity headers.
pub fn router(state: SharedState) -> Router<()> {
    let user_router = slots::router()
        .merge(game::router())
        .merge(roster::router())
        .merge(workspace::router())
        .merge(sse::router())
        .route_layer(middleware::from_fn(identity::require_user));

    health::router()
        .merge(user_router)
        .merge(docs::router())
        .with_state(state)
}
