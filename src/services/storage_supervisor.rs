//! Background task keeping a score store installed and toggling degraded mode.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{score_store::ScoreStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect through `connect`, install the store and watch its health forever.
///
/// A failing store is first given a few reconnect attempts in degraded mode.
/// When those are exhausted, every workspace is torn down and a fresh
/// connection is established.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ScoreStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_score_store(store.clone()).await;
                info!("score store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch(&state, store.as_ref()).await;

                warn!("score store lost; dropping workspaces and reconnecting");
                release_workspaces(&state).await;
            }
            Err(err) => {
                warn!(error = %err, "score store connection attempt failed");
            }
        }
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll `store` until it stays unreachable after [`MAX_RECONNECT_ATTEMPTS`].
async fn watch(state: &SharedState, store: &dyn ScoreStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("score store healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "score store health check failed; entering degraded mode");
                state.update_degraded(true).await;
                if !recover(store).await {
                    return;
                }
                state.update_degraded(false).await;
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Retry the connection with backoff. Returns whether it came back.
async fn recover(store: &dyn ScoreStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "score store reconnected");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "score store reconnect attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

/// Stop every workspace's subscriptions; they are rebuilt on the next request.
async fn release_workspaces(state: &SharedState) {
    let keys = state
        .workspaces()
        .iter()
        .map(|entry| entry.key().clone())
        .collect::<Vec<_>>();
    for key in keys {
        if let Some((_, workspace)) = state.workspaces().remove(&key) {
            workspace.lock().await.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::score_store::memory::MemoryScoreStore, state::AppState};

    #[tokio::test]
    async fn installs_the_connected_store() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);

        let store = MemoryScoreStore::new();
        let handle = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ScoreStore>) }
        }));

        let mut watcher = state.degraded_watcher();
        tokio::time::timeout(Duration::from_secs(2), watcher.wait_for(|degraded| !degraded))
            .await
            .unwrap()
            .unwrap();
        assert!(state.require_score_store().await.is_ok());
        handle.abort();
    }
}
