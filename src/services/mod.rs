/// OpenAPI documentation generation.
pub mod documentation;
/// Selecting players, entering and settling games on an opened slot.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Roster additions and guarded removals.
pub mod roster_service;
/// Slot creation, listing and deletion.
pub mod slot_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming per device.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Device workspaces and the live subscriptions feeding them.
pub mod workspace_service;
