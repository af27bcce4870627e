//! Live queries over a [`ScoreStore`].
//!
//! A subscription first delivers the current content of the watched collection,
//! then a fresh full snapshot every time the store reports a change on it.
//! Dropping the [`Subscription`] stops its listener task.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dao::{
    models::{GameEntity, RosterPlayerEntity, SlotEntity},
    score_store::{CollectionPath, ScoreStore},
    storage::StorageResult,
};

const SUBSCRIPTION_BUFFER: usize = 8;

/// Ordered query that can be watched through [`subscribe`].
pub trait Query: Send + Sync + 'static {
    /// Document type returned by the query.
    type Item: Clone + Send + 'static;

    /// Collection whose changes invalidate the query result.
    fn path(&self) -> CollectionPath;

    /// Run the query against the store.
    fn fetch(&self, store: &dyn ScoreStore) -> BoxFuture<'static, StorageResult<Vec<Self::Item>>>;
}

/// Every slot of a user, newest first.
#[derive(Debug, Clone)]
pub struct SlotsQuery {
    pub owner: String,
}

/// Every game of a slot, most recent game number first.
#[derive(Debug, Clone)]
pub struct GamesQuery {
    pub owner: String,
    pub slot_id: Uuid,
}

/// The user's roster, sorted by name.
#[derive(Debug, Clone)]
pub struct RosterQuery {
    pub owner: String,
}

impl Query for SlotsQuery {
    type Item = SlotEntity;

    fn path(&self) -> CollectionPath {
        CollectionPath::Slots {
            owner: self.owner.clone(),
        }
    }

    fn fetch(&self, store: &dyn ScoreStore) -> BoxFuture<'static, StorageResult<Vec<SlotEntity>>> {
        store.list_slots(&self.owner)
    }
}

impl Query for GamesQuery {
    type Item = GameEntity;

    fn path(&self) -> CollectionPath {
        CollectionPath::Games {
            owner: self.owner.clone(),
            slot_id: self.slot_id,
        }
    }

    fn fetch(&self, store: &dyn ScoreStore) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        store.list_games(&self.owner, self.slot_id)
    }
}

impl Query for RosterQuery {
    type Item = RosterPlayerEntity;

    fn path(&self) -> CollectionPath {
        CollectionPath::Roster {
            owner: self.owner.clone(),
        }
    }

    fn fetch(
        &self,
        store: &dyn ScoreStore,
    ) -> BoxFuture<'static, StorageResult<Vec<RosterPlayerEntity>>> {
        store.list_roster(&self.owner)
    }
}

/// Full content of a watched collection at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// Increases by one with every snapshot delivered by the same subscription.
    pub revision: u64,
    pub items: Vec<T>,
}

/// Item delivered by a [`Subscription`].
#[derive(Debug, Clone)]
pub enum SubscriptionEvent<T> {
    Snapshot(Snapshot<T>),
    /// The query failed; the subscription stays alive and retries on the next change.
    Failed(String),
}

/// Aborts the wrapped task when dropped.
#[derive(Debug)]
pub struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle on a live query. Receiving yields the initial snapshot first.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::Receiver<SubscriptionEvent<T>>,
    _listener: TaskGuard,
}

impl<T> Subscription<T> {
    /// Wait for the next event. Returns `None` once the store stopped publishing changes.
    pub async fn next(&mut self) -> Option<SubscriptionEvent<T>> {
        self.receiver.recv().await
    }
}

/// Start watching `query`. Must be called from within a Tokio runtime.
pub fn subscribe<Q: Query>(store: Arc<dyn ScoreStore>, query: Q) -> Subscription<Q::Item> {
    // Register for changes before the initial fetch so no write slips in between.
    let mut changes = store.changes();
    let (tx, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
    let path = query.path();

    let handle = tokio::spawn(async move {
        let mut revision = 0;
        if !publish(store.as_ref(), &query, &tx, &mut revision).await {
            return;
        }

        loop {
            match changes.recv().await {
                Ok(event) if event.path == path => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(?path, skipped, "change feed lagged; refreshing snapshot");
                }
                Err(RecvError::Closed) => break,
            }

            if !publish(store.as_ref(), &query, &tx, &mut revision).await {
                break;
            }
        }
        debug!(?path, "subscription closed");
    });

    Subscription {
        receiver,
        _listener: TaskGuard::new(handle),
    }
}

/// Run the query and forward its result. Returns `false` once the receiver is gone.
async fn publish<Q: Query>(
    store: &dyn ScoreStore,
    query: &Q,
    tx: &mpsc::Sender<SubscriptionEvent<Q::Item>>,
    revision: &mut u64,
) -> bool {
    let event = match query.fetch(store).await {
        Ok(items) => {
            *revision += 1;
            SubscriptionEvent::Snapshot(Snapshot {
                revision: *revision,
                items,
            })
        }
        Err(err) => {
            warn!(path = ?query.path(), error = %err, "subscription query failed");
            SubscriptionEvent::Failed(err.to_string())
        }
    };

    tx.send(event).await.is_ok()
}
