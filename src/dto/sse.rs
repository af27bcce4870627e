use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{roster::RosterPlayerSummary, slot::SlotSummary};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Device the stream belongs to.
    pub device: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Pushed whenever the user's slot list changes.
pub struct SlotsUpdatedEvent {
    pub slots: Vec<SlotSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Pushed whenever the user's roster changes.
pub struct RosterUpdatedEvent {
    pub players: Vec<RosterPlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Informational notice, e.g. when the opened slot was deleted elsewhere.
pub struct InfoEvent {
    pub message: String,
}
