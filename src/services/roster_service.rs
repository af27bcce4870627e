use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::RosterPlayerEntity,
    dto::{
        common::Identity,
        roster::{CreateRosterPlayerRequest, RosterPlayerSummary},
    },
    error::ServiceError,
    services::workspace_service,
    state::{
        SharedState,
        roster::{RosterError, validate_new_name},
        transitions::with_timeout,
    },
};

/// Roster of the caller, sorted by name.
pub async fn list_players(
    state: &SharedState,
    identity: &Identity,
) -> Result<Vec<RosterPlayerSummary>, ServiceError> {
    let workspace = workspace_service::acquire(state, identity).await?;
    let guard = workspace.lock().await;
    Ok(guard.roster().iter().map(Into::into).collect())
}

/// Add a player. Names are trimmed and must be unique regardless of case.
pub async fn add_player(
    state: &SharedState,
    identity: &Identity,
    request: CreateRosterPlayerRequest,
) -> Result<RosterPlayerSummary, ServiceError> {
    let store = state.require_score_store().await?;
    let limit = state.transition_timeout();

    let current = with_timeout(limit, store.list_roster(&identity.owner)).await?;
    let name = validate_new_name(&request.name, &current)?;
    let player = RosterPlayerEntity {
        id: Uuid::new_v4(),
        name,
        created_at: SystemTime::now(),
    };
    with_timeout(limit, store.save_roster_player(&identity.owner, player.clone())).await?;

    info!(owner = %identity.owner, player = %player.name, "roster player added");
    Ok(RosterPlayerSummary::from(&player))
}

/// Remove a player unless a game being entered or edited on any of the
/// caller's devices still refers to them.
pub async fn remove_player(
    state: &SharedState,
    identity: &Identity,
    id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_score_store().await?;
    let limit = state.transition_timeout();

    let current = with_timeout(limit, store.list_roster(&identity.owner)).await?;
    let player = current
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ServiceError::NotFound(format!("roster player `{id}` not found")))?;

    for workspace in state.workspaces_of(&identity.owner) {
        if workspace.lock().await.references_player(&player.name) {
            return Err(RosterError::InUse(player.name).into());
        }
    }

    if !with_timeout(limit, store.delete_roster_player(&identity.owner, id)).await? {
        return Err(ServiceError::NotFound(format!(
            "roster player `{id}` not found"
        )));
    }
    info!(owner = %identity.owner, player = %player.name, "roster player removed");
    Ok(())
}
