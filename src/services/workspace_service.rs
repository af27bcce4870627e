//! Lifecycle of per-device workspaces and the live subscriptions feeding them.

use std::{
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::{sync::Mutex, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{GameEntity, RosterPlayerEntity, SlotEntity},
        score_store::subscription::{
            GamesQuery, RosterQuery, SlotsQuery, Subscription, SubscriptionEvent, TaskGuard,
            subscribe,
        },
        storage::StorageError,
    },
    dto::{common::Identity, slot::SlotView},
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        board::SlotBoard,
        reconcile::{GamesOutcome, previous_slot},
        transitions::with_timeout,
        workspace::{SharedWorkspace, Workspace, WorkspaceKey},
    },
};

/// Key of the caller's workspace.
pub fn workspace_key(identity: &Identity) -> WorkspaceKey {
    WorkspaceKey {
        owner: identity.owner.clone(),
        device: identity.device.clone(),
    }
}

/// Return the caller's workspace, creating it and starting its slot and
/// roster subscriptions on first use.
pub async fn acquire(
    state: &SharedState,
    identity: &Identity,
) -> Result<SharedWorkspace, ServiceError> {
    let store = state.require_score_store().await?;
    let key = workspace_key(identity);

    let workspace = state
        .workspaces()
        .entry(key.clone())
        .or_insert_with(|| {
            let events = state.device_events(&key);
            Arc::new(Mutex::new(Workspace::new(
                key.clone(),
                identity.owner_name.clone(),
                store.clone(),
                events,
            )))
        })
        .value()
        .clone();

    {
        let mut guard = workspace.lock().await;
        guard.set_owner_name(&identity.owner_name);
        if !guard.uses_store(&store) {
            info!(owner = %key.owner, device = %key.device, "storage handle replaced; restarting workspace");
            guard.rebind(store);
        }
        if !guard.started {
            start(&workspace, &mut guard, state.transition_timeout()).await?;
        }
    }

    Ok(workspace)
}

/// Tear down the caller's workspace and every subscription it owns.
pub async fn close(state: &SharedState, identity: &Identity) -> bool {
    let key = workspace_key(identity);
    let Some((_, workspace)) = state.workspaces().remove(&key) else {
        return false;
    };
    workspace.lock().await.shutdown();
    info!(owner = %key.owner, device = %key.device, "workspace closed");
    true
}

/// Open `slot_id` on the caller's device: its games are followed live and the
/// board is reconciled against the first snapshot before returning.
pub async fn open_slot(
    state: &SharedState,
    identity: &Identity,
    slot_id: Uuid,
) -> Result<SlotView, ServiceError> {
    let workspace = acquire(state, identity).await?;
    let mut guard = workspace.lock().await;
    let store = guard.store();
    let owner = guard.owner().to_string();
    let limit = state.transition_timeout();

    // A slot created a moment ago may not have reached the live list yet.
    if !guard.slots().iter().any(|s| s.id == slot_id) {
        guard.slots = with_timeout(limit, store.list_slots(&owner)).await?;
    }
    let slot = guard
        .slots()
        .iter()
        .find(|s| s.id == slot_id)
        .cloned()
        .ok_or_else(|| ServiceError::NotFound(format!("slot `{slot_id}` not found")))?;

    guard.close_board();
    guard.board = Some(SlotBoard::new(slot));

    let mut games = subscribe(store, GamesQuery { owner, slot_id });
    let initial = match first_snapshot(&mut games, limit).await {
        Ok(items) => items,
        Err(err) => {
            guard.close_board();
            return Err(err);
        }
    };
    if let Err(err) = reconcile_games(&mut guard, slot_id, initial, limit).await {
        guard.close_board();
        return Err(err);
    }

    guard.listeners.games = Some(spawn_listener(
        Arc::downgrade(&workspace),
        games,
        move |workspace, games| on_games(workspace, slot_id, games, limit),
    ));
    info!(slot_id = %slot_id, device = %identity.device, "slot opened");

    sse_events::publish_slot_view(&guard);
    guard
        .board()
        .map(SlotView::from)
        .ok_or_else(|| ServiceError::InvalidState("slot closed while opening".into()))
}

async fn start(
    handle: &SharedWorkspace,
    workspace: &mut Workspace,
    limit: Option<Duration>,
) -> Result<(), ServiceError> {
    let store = workspace.store();
    let owner = workspace.owner().to_string();

    let mut slots = subscribe(
        store.clone(),
        SlotsQuery {
            owner: owner.clone(),
        },
    );
    let mut roster = subscribe(store, RosterQuery { owner });
    workspace.slots = first_snapshot(&mut slots, limit).await?;
    workspace.roster = first_snapshot(&mut roster, limit).await?;

    let weak = Arc::downgrade(handle);
    workspace.listeners.slots = Some(spawn_listener(weak.clone(), slots, on_slots));
    workspace.listeners.roster = Some(spawn_listener(weak, roster, on_roster));
    workspace.started = true;
    debug!(owner = %workspace.owner(), device = %workspace.key().device, "workspace started");

    sse_events::publish_slots(workspace);
    sse_events::publish_roster(workspace);
    Ok(())
}

/// Wait for the initial snapshot of a fresh subscription.
async fn first_snapshot<T>(
    subscription: &mut Subscription<T>,
    limit: Option<Duration>,
) -> Result<Vec<T>, ServiceError> {
    let event = match limit {
        Some(limit) => timeout(limit, subscription.next())
            .await
            .map_err(|_| ServiceError::Timeout)?,
        None => subscription.next().await,
    };
    match event {
        Some(SubscriptionEvent::Snapshot(snapshot)) => Ok(snapshot.items),
        Some(SubscriptionEvent::Failed(message)) => {
            Err(ServiceError::Unavailable(StorageError::Rejected(message)))
        }
        None => Err(ServiceError::Degraded),
    }
}

/// Forward every later snapshot of `subscription` to `handler` while the
/// workspace is alive. Failed queries are skipped; the next change retries.
fn spawn_listener<T, F, Fut>(
    workspace: Weak<Mutex<Workspace>>,
    mut subscription: Subscription<T>,
    handler: F,
) -> TaskGuard
where
    T: Send + 'static,
    F: Fn(SharedWorkspace, Vec<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    TaskGuard::new(tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            let items = match event {
                SubscriptionEvent::Snapshot(snapshot) => snapshot.items,
                SubscriptionEvent::Failed(message) => {
                    warn!(error = %message, "live query failed; keeping previous snapshot");
                    continue;
                }
            };
            let Some(workspace) = workspace.upgrade() else {
                break;
            };
            handler(workspace, items).await;
        }
    }))
}

async fn on_slots(workspace: SharedWorkspace, slots: Vec<SlotEntity>) {
    let mut guard = workspace.lock().await;
    guard.slots = slots;

    let deleted = guard
        .board()
        .map(SlotBoard::slot_id)
        .filter(|id| !guard.slots().iter().any(|s| s.id == *id));
    if let Some(slot_id) = deleted {
        guard.close_board();
        info!(slot_id = %slot_id, "opened slot was deleted");
        sse_events::publish_info(&guard.events(), "the opened slot was deleted");
    }
    sse_events::publish_slots(&guard);
}

async fn on_roster(workspace: SharedWorkspace, roster: Vec<RosterPlayerEntity>) {
    let mut guard = workspace.lock().await;
    guard.roster = roster;
    let names = guard.roster_names();

    let changed = match guard.board.as_mut() {
        Some(board) => board.apply_roster(&names).unwrap_or_else(|err| {
            warn!(error = %err, "failed to filter the board against the roster");
            false
        }),
        None => false,
    };
    sse_events::publish_roster(&guard);
    if changed {
        sse_events::publish_slot_view(&guard);
    }
}

async fn on_games(
    workspace: SharedWorkspace,
    slot_id: Uuid,
    games: Vec<GameEntity>,
    limit: Option<Duration>,
) {
    let mut guard = workspace.lock().await;
    match reconcile_games(&mut guard, slot_id, games, limit).await {
        Ok(()) => sse_events::publish_slot_view(&guard),
        Err(err) => warn!(slot_id = %slot_id, error = %err, "failed to reconcile games"),
    }
}

/// Merge a games snapshot into the board of `slot_id`. Snapshots of a slot
/// that is no longer open are ignored. Loading the previous slot is bounded
/// by `limit` since the workspace stays locked meanwhile.
async fn reconcile_games(
    workspace: &mut Workspace,
    slot_id: Uuid,
    games: Vec<GameEntity>,
    limit: Option<Duration>,
) -> Result<(), ServiceError> {
    let store = workspace.store();
    let owner = workspace.owner().to_string();
    let roster = workspace.roster_names();

    let Some(board) = workspace.board.as_mut().filter(|b| b.slot_id() == slot_id) else {
        return Ok(());
    };

    match board.apply_games_snapshot(games, &roster)? {
        GamesOutcome::NeedsPreviousSlot => {
            let Some(previous) = previous_slot(&workspace.slots, slot_id) else {
                return Ok(());
            };
            let previous_id = previous.id;
            match with_timeout(limit, store.list_games(&owner, previous_id)).await {
                Ok(previous_games) => {
                    if board.seed_from_previous_slot(previous_id, &previous_games, &roster)? {
                        debug!(slot_id = %slot_id, previous = %previous_id, "selection proposed from previous slot");
                    }
                }
                Err(err) => {
                    warn!(slot_id = %slot_id, previous = %previous_id, error = %err, "failed to load previous slot");
                }
            }
        }
        GamesOutcome::Resumed(game_id) => {
            info!(slot_id = %slot_id, game_id = %game_id, "unsettled game resumed");
        }
        GamesOutcome::Seeded(_) | GamesOutcome::HistoryOnly => {}
    }
    Ok(())
}
