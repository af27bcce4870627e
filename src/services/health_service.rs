use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the score store and report whether the backend runs degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_score_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "score store health check failed");
            }
        }
        Err(_) => warn!("score store unavailable (degraded mode)"),
    }

    HealthResponse::new(state.is_degraded().await, state.workspaces().len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::score_store::{ScoreStore, memory::MemoryScoreStore},
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");

        state
            .set_score_store(Arc::new(MemoryScoreStore::new()) as Arc<dyn ScoreStore>)
            .await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.open_workspaces, 0);
    }
}
