use std::time::SystemTime;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::SlotEntity,
    dto::{
        common::Identity,
        slot::{CreateSlotRequest, SlotSummary},
    },
    error::ServiceError,
    services::{sse_events, workspace_service},
    state::{SharedState, transitions::with_timeout},
};

/// Slots of the caller, newest first.
pub async fn list_slots(
    state: &SharedState,
    identity: &Identity,
) -> Result<Vec<SlotSummary>, ServiceError> {
    let workspace = workspace_service::acquire(state, identity).await?;
    let guard = workspace.lock().await;
    Ok(guard.slots().iter().map(Into::into).collect())
}

/// Create a slot dated today (UTC), numbered after the caller's other slots of the same day.
pub async fn create_slot(
    state: &SharedState,
    identity: &Identity,
    request: CreateSlotRequest,
) -> Result<SlotSummary, ServiceError> {
    let store = state.require_score_store().await?;
    let limit = state.transition_timeout();

    let now = SystemTime::now();
    let date = calendar_date(OffsetDateTime::from(now));
    let existing = with_timeout(limit, store.list_slots(&identity.owner)).await?;
    let slot_number = existing
        .iter()
        .filter(|s| s.date == date)
        .map(|s| s.slot_number)
        .max()
        .unwrap_or(0)
        + 1;

    let slot = SlotEntity {
        id: Uuid::new_v4(),
        slot_number,
        date,
        created_at: now,
        owner_name: identity.owner_name.clone(),
        drop_value: request
            .drop_value
            .unwrap_or(state.config().default_drop_value),
    };
    with_timeout(limit, store.save_slot(&identity.owner, slot.clone())).await?;

    info!(owner = %identity.owner, slot_id = %slot.id, date = %slot.date, slot_number, "slot created");
    Ok(SlotSummary::from(&slot))
}

/// Delete a slot and all of its games. Devices that had it open are told so.
pub async fn delete_slot(
    state: &SharedState,
    identity: &Identity,
    id: Uuid,
    confirm: bool,
) -> Result<(), ServiceError> {
    if !confirm {
        return Err(ServiceError::InvalidInput(
            "deleting a slot removes all of its games; repeat with `confirm=true`".into(),
        ));
    }
    let store = state.require_score_store().await?;

    if !with_timeout(
        state.transition_timeout(),
        store.delete_slot(&identity.owner, id),
    )
    .await?
    {
        return Err(ServiceError::NotFound(format!("slot `{id}` not found")));
    }

    for workspace in state.workspaces_of(&identity.owner) {
        let mut guard = workspace.lock().await;
        if guard.board().is_some_and(|board| board.slot_id() == id) {
            guard.close_board();
            sse_events::publish_info(&guard.events(), "the opened slot was deleted");
        }
    }
    info!(owner = %identity.owner, slot_id = %id, "slot deleted");
    Ok(())
}

/// `YYYY-MM-DD` of `moment` in UTC.
fn calendar_date(moment: OffsetDateTime) -> String {
    let date = moment.date();
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_date_is_zero_padded() {
        let moment = OffsetDateTime::from_unix_timestamp(1_704_164_645).unwrap();
        assert_eq!(calendar_date(moment), "2024-01-02");
    }
}
