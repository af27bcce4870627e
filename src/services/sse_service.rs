use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::{
        common::Identity,
        sse::{Handshake, ServerEvent},
    },
    services::{sse_events, workspace_service},
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Attach a new stream to the caller's device hub.
///
/// The stream always opens, even in degraded mode. When the store is reachable
/// the workspace is started and its current slots, roster and opened slot are
/// pushed right after the handshake.
pub async fn subscribe_device(
    state: &SharedState,
    identity: &Identity,
) -> broadcast::Receiver<ServerEvent> {
    let key = workspace_service::workspace_key(identity);
    let hub = state.device_events(&key);
    let receiver = hub.subscribe();

    let degraded = state.is_degraded().await;
    let handshake = Handshake {
        device: identity.device.clone(),
        message: format!("connected as {}", identity.owner_name),
        degraded,
    };
    if let Ok(event) = ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &handshake) {
        hub.broadcast(event);
    }

    if !degraded {
        match workspace_service::acquire(state, identity).await {
            Ok(workspace) => {
                let guard = workspace.lock().await;
                sse_events::publish_slots(&guard);
                sse_events::publish_roster(&guard);
                sse_events::publish_slot_view(&guard);
            }
            Err(err) => debug!(error = %err, "workspace unavailable for new stream"),
        }
    }

    receiver
}

/// Convert a broadcast receiver into an SSE response, forwarding events until
/// the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    device: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Views are full snapshots, so the next one catches the client up.
                            debug!(device = %device, skipped, "device stream lagged");
                        }
                    }
                }
            }
        }
        info!(device = %device, "device SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
