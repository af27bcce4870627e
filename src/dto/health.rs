use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Device workspaces currently following the store.
    pub open_workspaces: usize,
}

impl HealthResponse {
    pub fn new(degraded: bool, open_workspaces: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            open_workspaces,
        }
    }
}
