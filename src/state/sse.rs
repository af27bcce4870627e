use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Capacity of each device's event channel.
pub const DEVICE_STREAM_CAPACITY: usize = 32;

/// Simple broadcast hub wrapper used by the SSE services.
#[derive(Debug)]
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl Default for SseHub {
    fn default() -> Self {
        Self::new(DEVICE_STREAM_CAPACITY)
    }
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
