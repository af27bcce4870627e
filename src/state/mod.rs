pub mod board;
pub mod reconcile;
pub mod roster;
pub mod session;
pub mod settlement;
mod sse;
pub mod standings;
pub mod state_machine;
pub mod transitions;
pub mod workspace;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig, dao::score_store::ScoreStore, dto::sse::ServerEvent, error::ServiceError,
};

pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, PlanError};
use self::workspace::{SharedWorkspace, WorkspaceKey};

pub type SharedState = Arc<AppState>;

/// Central application state: the store handle, degraded flag and the
/// workspaces of every connected device.
pub struct AppState {
    score_store: RwLock<Option<Arc<dyn ScoreStore>>>,
    degraded: watch::Sender<bool>,
    workspaces: DashMap<WorkspaceKey, SharedWorkspace>,
    hubs: DashMap<WorkspaceKey, Arc<SseHub>>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            score_store: RwLock::new(None),
            degraded: degraded_tx,
            workspaces: DashMap::new(),
            hubs: DashMap::new(),
            config,
        })
    }

    /// Install a store and leave degraded mode.
    pub async fn set_score_store(&self, store: Arc<dyn ScoreStore>) {
        {
            let mut guard = self.score_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Obtain a handle to the current store, failing while degraded.
    pub async fn require_score_store(&self) -> Result<Arc<dyn ScoreStore>, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        let guard = self.score_store.read().await;
        guard.as_ref().cloned().ok_or(ServiceError::Degraded)
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Workspaces keyed by user and device.
    pub fn workspaces(&self) -> &DashMap<WorkspaceKey, SharedWorkspace> {
        &self.workspaces
    }

    /// Every open workspace of `owner`, across devices.
    pub fn workspaces_of(&self, owner: &str) -> Vec<SharedWorkspace> {
        self.workspaces
            .iter()
            .filter(|entry| entry.key().owner == owner)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Event hub of a device, created on first use. Hubs outlive workspaces so a
    /// stream stays connected while the store is unavailable.
    pub fn device_events(&self, key: &WorkspaceKey) -> Arc<SseHub> {
        self.hubs
            .entry(key.clone())
            .or_insert_with(|| Arc::new(SseHub::default()))
            .value()
            .clone()
    }

    /// Send `event` to every connected device.
    pub fn broadcast_all(&self, event: &ServerEvent) {
        for hub in self.hubs.iter() {
            hub.value().broadcast(event.clone());
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Timeout applied to store writes backing a transition.
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.config.transition_timeout
    }
}
