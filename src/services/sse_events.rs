use serde::Serialize;
use tracing::{info, warn};

use crate::{
    dto::{
        roster::RosterPlayerSummary,
        slot::{SlotSummary, SlotView},
        sse::{InfoEvent, RosterUpdatedEvent, ServerEvent, SlotsUpdatedEvent, SystemStatus},
    },
    state::{SharedState, SseHub, workspace::Workspace},
};

const EVENT_SLOTS_UPDATED: &str = "slots.updated";
const EVENT_ROSTER_UPDATED: &str = "roster.updated";
const EVENT_SLOT_VIEW: &str = "slot.view";
const EVENT_INFO: &str = "info";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Push the workspace's slot list to its device.
pub fn publish_slots(workspace: &Workspace) {
    let payload = SlotsUpdatedEvent {
        slots: workspace.slots().iter().map(SlotSummary::from).collect(),
    };
    send_event(&workspace.events(), EVENT_SLOTS_UPDATED, &payload);
}

/// Push the workspace's roster to its device.
pub fn publish_roster(workspace: &Workspace) {
    let payload = RosterUpdatedEvent {
        players: workspace
            .roster()
            .iter()
            .map(RosterPlayerSummary::from)
            .collect(),
    };
    send_event(&workspace.events(), EVENT_ROSTER_UPDATED, &payload);
}

/// Push the view of the opened slot, if any.
pub fn publish_slot_view(workspace: &Workspace) {
    if let Some(board) = workspace.board() {
        send_event(&workspace.events(), EVENT_SLOT_VIEW, &SlotView::from(board));
    }
}

/// Push a human-readable notice.
pub fn publish_info(hub: &SseHub, message: &str) {
    let payload = InfoEvent {
        message: message.to_string(),
    };
    send_event(hub, EVENT_INFO, &payload);
}

/// Forward degraded mode changes to every connected device.
pub fn spawn_degraded_notifier(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    tokio::spawn(async move {
        while watcher.changed().await.is_ok() {
            let degraded = *watcher.borrow_and_update();
            info!(degraded, "storage availability changed");
            match ServerEvent::json(
                Some(EVENT_SYSTEM_STATUS.to_string()),
                &SystemStatus { degraded },
            ) {
                Ok(event) => state.broadcast_all(&event),
                Err(err) => warn!(error = %err, "failed to serialize system status"),
            }
        }
    });
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
