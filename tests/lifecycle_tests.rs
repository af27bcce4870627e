//! End-to-end game lifecycle through the service layer, backed by the in-memory store.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::future::{self, BoxFuture};
use tally_back::{
    config::AppConfig,
    dao::{
        models::{GameEntity, GamePlayerEntity, RosterPlayerEntity, SlotEntity},
        score_store::{ChangeEvent, ScoreStore, memory::MemoryScoreStore},
        storage::StorageResult,
    },
    dto::{
        common::Identity,
        game::{PointsRequest, SelectionRequest, StartGameRequest},
        phase::VisibleSlotPhase,
        roster::CreateRosterPlayerRequest,
        slot::{CreateSlotRequest, SlotView},
    },
    error::ServiceError,
    services::{game_service, roster_service, slot_service, workspace_service},
    state::{AppState, SharedState},
};
use tokio::sync::broadcast;
use uuid::Uuid;

async fn setup() -> (SharedState, MemoryScoreStore) {
    let state = AppState::new(AppConfig::default());
    let store = MemoryScoreStore::new();
    state
        .set_score_store(Arc::new(store.clone()) as Arc<dyn ScoreStore>)
        .await;
    (state, store)
}

fn device(name: &str) -> Identity {
    Identity {
        owner: "user-1".into(),
        owner_name: "ann@example.org".into(),
        device: name.into(),
    }
}

async fn add_roster(state: &SharedState, identity: &Identity, names: &[&str]) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for name in names {
        let player = roster_service::add_player(
            state,
            identity,
            CreateRosterPlayerRequest {
                name: name.to_string(),
            },
        )
        .await
        .unwrap();
        ids.push(player.id);
    }
    ids
}

async fn new_slot(state: &SharedState, identity: &Identity) -> Uuid {
    slot_service::create_slot(state, identity, CreateSlotRequest::default())
        .await
        .unwrap()
        .id
}

async fn select(state: &SharedState, identity: &Identity, slot: Uuid, names: &[&str]) -> SlotView {
    game_service::set_selection(
        state,
        identity,
        slot,
        SelectionRequest {
            players: names.iter().map(|n| n.to_string()).collect(),
        },
    )
    .await
    .unwrap()
}

async fn enter(state: &SharedState, identity: &Identity, slot: Uuid, name: &str, points: u32) {
    game_service::set_points(state, identity, slot, name.into(), PointsRequest { points })
        .await
        .unwrap();
}

fn scores(view: &SlotView, game: usize) -> Vec<(String, i64)> {
    view.games[game]
        .players
        .iter()
        .map(|p| (p.name.clone(), p.score))
        .collect()
}

#[tokio::test]
async fn settled_game_is_written_and_seeds_next_selection() {
    let (state, _store) = setup().await;
    let me = device("phone");
    add_roster(&state, &me, &["A", "B", "C"]).await;
    let slot = new_slot(&state, &me).await;

    let view = workspace_service::open_slot(&state, &me, slot).await.unwrap();
    assert_eq!(view.phase, VisibleSlotPhase::NoActiveGame);
    assert_eq!(view.next_game_number, 1);

    select(&state, &me, slot, &["A", "B", "C"]).await;
    let view = game_service::start_game(
        &state,
        &me,
        slot,
        StartGameRequest {
            is_rotation_game: None,
            board_charge: Some(5),
        },
    )
    .await
    .unwrap();
    assert_eq!(view.phase, VisibleSlotPhase::Active);

    enter(&state, &me, slot, "A", 10).await;
    enter(&state, &me, slot, "B", 20).await;
    let view = game_service::settle(&state, &me, slot).await.unwrap();

    assert_eq!(view.phase, VisibleSlotPhase::Setup);
    assert_eq!(view.selection, ["A", "B", "C"]);
    assert_eq!(view.games.len(), 1);
    assert_eq!(
        scores(&view, 0),
        [("A".to_string(), -10), ("B".to_string(), -20), ("C".to_string(), 25)]
    );
    assert_eq!(view.games[0].winner_player_name.as_deref(), Some("C"));
    assert_eq!(view.games[0].points_transferred, 30);
    assert_eq!(view.next_game_number, 2);
    assert_eq!(view.editable_game_id, Some(view.games[0].id));
}

#[tokio::test]
async fn failed_write_keeps_entries_for_retry() {
    let (state, store) = setup().await;
    let me = device("phone");
    add_roster(&state, &me, &["A", "B"]).await;
    let slot = new_slot(&state, &me).await;
    workspace_service::open_slot(&state, &me, slot).await.unwrap();
    select(&state, &me, slot, &["A", "B"]).await;
    game_service::start_game(&state, &me, slot, StartGameRequest::default())
        .await
        .unwrap();
    enter(&state, &me, slot, "A", 7).await;

    store.set_offline(true);
    let err = game_service::settle(&state, &me, slot).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    let view = game_service::slot_view(&state, &me, slot).await.unwrap();
    assert_eq!(view.phase, VisibleSlotPhase::Active);
    assert_eq!(view.session.as_ref().unwrap().players[0].points_lost, 7);

    store.set_offline(false);
    let view = game_service::settle(&state, &me, slot).await.unwrap();
    assert_eq!(scores(&view, 0), [("A".to_string(), -7), ("B".to_string(), 7)]);
}

#[tokio::test]
async fn settlement_rules_are_enforced() {
    let (state, _store) = setup().await;
    let me = device("phone");
    add_roster(&state, &me, &["A", "B", "C"]).await;
    let slot = new_slot(&state, &me).await;
    workspace_service::open_slot(&state, &me, slot).await.unwrap();

    select(&state, &me, slot, &["A"]).await;
    let err = game_service::start_game(&state, &me, slot, StartGameRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    select(&state, &me, slot, &["A", "B", "C"]).await;
    game_service::start_game(&state, &me, slot, StartGameRequest::default())
        .await
        .unwrap();
    enter(&state, &me, slot, "A", 3).await;

    // Two zero entries: no single winner yet.
    let err = game_service::settle(&state, &me, slot).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    // Dropping B would leave A and C with C winning by default.
    let err = game_service::drop_player(&state, &me, slot, "B".into())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let view = game_service::cancel(&state, &me, slot).await.unwrap();
    assert!(view.session.is_none());
    assert!(view.games.is_empty());
    assert_eq!(view.phase, VisibleSlotPhase::Setup);
}

#[tokio::test]
async fn editing_overwrites_the_same_record() {
    let (state, store) = setup().await;
    let me = device("phone");
    add_roster(&state, &me, &["A", "B"]).await;
    let slot = new_slot(&state, &me).await;
    workspace_service::open_slot(&state, &me, slot).await.unwrap();
    select(&state, &me, slot, &["A", "B"]).await;
    game_service::start_game(&state, &me, slot, StartGameRequest::default())
        .await
        .unwrap();
    enter(&state, &me, slot, "A", 4).await;
    let view = game_service::settle(&state, &me, slot).await.unwrap();
    let game_id = view.games[0].id;

    let view = game_service::begin_edit(&state, &me, slot, game_id)
        .await
        .unwrap();
    assert_eq!(view.phase, VisibleSlotPhase::Editing);
    let session = view.session.unwrap();
    assert!(session.editing);
    assert_eq!(session.players[0].points_lost, 4);
    assert_eq!(session.players[1].points_lost, 0);

    enter(&state, &me, slot, "A", 9).await;
    let view = game_service::settle(&state, &me, slot).await.unwrap();
    assert_eq!(view.phase, VisibleSlotPhase::Setup);
    assert_eq!(view.games.len(), 1);
    assert_eq!(view.games[0].id, game_id);
    assert_eq!(scores(&view, 0), [("A".to_string(), -9), ("B".to_string(), 9)]);

    let stored = store.list_games("user-1", slot).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].players[1].score, 9);
}

#[tokio::test]
async fn roster_player_in_a_game_cannot_be_removed() {
    let (state, _store) = setup().await;
    let me = device("phone");
    let ids = add_roster(&state, &me, &["A", "B"]).await;

    let err = roster_service::add_player(
        &state,
        &me,
        CreateRosterPlayerRequest { name: " a ".into() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    let slot = new_slot(&state, &me).await;
    workspace_service::open_slot(&state, &me, slot).await.unwrap();
    select(&state, &me, slot, &["A", "B"]).await;
    game_service::start_game(&state, &me, slot, StartGameRequest::default())
        .await
        .unwrap();

    // The game lives on another device of the same user.
    let other = device("tablet");
    let err = roster_service::remove_player(&state, &other, ids[0])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    game_service::cancel(&state, &me, slot).await.unwrap();
    roster_service::remove_player(&state, &other, ids[0])
        .await
        .unwrap();
}

#[tokio::test]
async fn second_device_sees_history_and_proposed_selection() {
    let (state, _store) = setup().await;
    let phone = device("phone");
    add_roster(&state, &phone, &["A", "B"]).await;
    let slot = new_slot(&state, &phone).await;
    workspace_service::open_slot(&state, &phone, slot).await.unwrap();
    select(&state, &phone, slot, &["A", "B"]).await;
    game_service::start_game(&state, &phone, slot, StartGameRequest::default())
        .await
        .unwrap();
    enter(&state, &phone, slot, "A", 2).await;
    game_service::settle(&state, &phone, slot).await.unwrap();

    // A fresh device sees the settled history and a proposed selection.
    let tablet = device("tablet");
    let view = workspace_service::open_slot(&state, &tablet, slot)
        .await
        .unwrap();
    assert_eq!(view.games.len(), 1);
    assert_eq!(view.phase, VisibleSlotPhase::Setup);
    assert_eq!(view.selection, ["A", "B"]);
}

#[tokio::test]
async fn unsettled_stored_game_is_resumed_on_open() {
    let (state, store) = setup().await;
    let me = device("phone");
    add_roster(&state, &me, &["A", "B"]).await;
    let slot = new_slot(&state, &me).await;

    let open_game = GameEntity {
        id: Uuid::new_v4(),
        slot_id: slot,
        game_number: 1,
        players: vec![
            GamePlayerEntity {
                name: "A".into(),
                score: -4,
                dropped: false,
            },
            GamePlayerEntity {
                name: "B".into(),
                score: 0,
                dropped: false,
            },
        ],
        winner_player_name: None,
        points_transferred: 0,
        board_charge: 0,
        is_rotation_game: true,
        created_at: SystemTime::now(),
        ended_at: None,
    };
    store.save_game("user-1", open_game.clone()).await.unwrap();

    let view = workspace_service::open_slot(&state, &me, slot).await.unwrap();
    assert_eq!(view.phase, VisibleSlotPhase::Active);
    let session = view.session.unwrap();
    assert_eq!(session.game_id, Some(open_game.id));
    assert!(session.is_rotation_game);
    assert_eq!(session.players[0].points_lost, 4);

    // Cancelling is local only; the stored game still blocks new games.
    game_service::cancel(&state, &me, slot).await.unwrap();
    let err = game_service::start_game(&state, &me, slot, StartGameRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // Settling the resumed game keeps its identity.
    workspace_service::open_slot(&state, &me, slot).await.unwrap();
    let view = game_service::settle(&state, &me, slot).await.unwrap();
    assert_eq!(view.games.len(), 1);
    assert_eq!(view.games[0].id, open_game.id);
    assert_eq!(scores(&view, 0), [("A".to_string(), -4), ("B".to_string(), 4)]);
}

#[tokio::test]
async fn new_slot_proposes_players_of_previous_slot() {
    let (state, _store) = setup().await;
    let me = device("phone");
    add_roster(&state, &me, &["A", "B", "C"]).await;

    let first = new_slot(&state, &me).await;
    workspace_service::open_slot(&state, &me, first).await.unwrap();
    select(&state, &me, first, &["B", "C"]).await;
    game_service::start_game(&state, &me, first, StartGameRequest::default())
        .await
        .unwrap();
    enter(&state, &me, first, "B", 1).await;
    game_service::settle(&state, &me, first).await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = new_slot(&state, &me).await;
    let view = workspace_service::open_slot(&state, &me, second)
        .await
        .unwrap();
    assert!(view.games.is_empty());
    assert_eq!(view.slot.slot_number, 2);
    assert_eq!(view.selection, ["B", "C"]);
    assert_eq!(view.phase, VisibleSlotPhase::Setup);
}

/// Memory store whose game listing of one slot never answers.
#[derive(Clone)]
struct StalledGames {
    inner: MemoryScoreStore,
    stalled: Arc<std::sync::Mutex<Option<Uuid>>>,
}

impl ScoreStore for StalledGames {
    fn list_slots(&self, owner: &str) -> BoxFuture<'static, StorageResult<Vec<SlotEntity>>> {
        self.inner.list_slots(owner)
    }
    fn find_slot(
        &self,
        owner: &str,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SlotEntity>>> {
        self.inner.find_slot(owner, id)
    }
    fn save_slot(&self, owner: &str, slot: SlotEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_slot(owner, slot)
    }
    fn delete_slot(&self, owner: &str, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.delete_slot(owner, id)
    }
    fn list_games(
        &self,
        owner: &str,
        slot_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        if *self.stalled.lock().unwrap() == Some(slot_id) {
            return Box::pin(future::pending());
        }
        self.inner.list_games(owner, slot_id)
    }
    fn save_game(&self, owner: &str, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_game(owner, game)
    }
    fn list_roster(
        &self,
        owner: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<RosterPlayerEntity>>> {
        self.inner.list_roster(owner)
    }
    fn save_roster_player(
        &self,
        owner: &str,
        player: RosterPlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_roster_player(owner, player)
    }
    fn delete_roster_player(
        &self,
        owner: &str,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.delete_roster_player(owner, id)
    }
    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes()
    }
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

#[tokio::test]
async fn stalled_previous_slot_does_not_block_opening() {
    let state = AppState::new(AppConfig {
        transition_timeout: Some(Duration::from_millis(200)),
        ..AppConfig::default()
    });
    let store = StalledGames {
        inner: MemoryScoreStore::new(),
        stalled: Arc::default(),
    };
    state
        .set_score_store(Arc::new(store.clone()) as Arc<dyn ScoreStore>)
        .await;
    let me = device("phone");

    let first = new_slot(&state, &me).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = new_slot(&state, &me).await;
    *store.stalled.lock().unwrap() = Some(first);

    let view = tokio::time::timeout(
        Duration::from_secs(3),
        workspace_service::open_slot(&state, &me, second),
    )
    .await
    .expect("opening the slot must not hang")
    .unwrap();
    assert!(view.selection.is_empty());
    assert_eq!(view.phase, VisibleSlotPhase::NoActiveGame);

    // The workspace lock was released, so later calls still go through.
    game_service::slot_view(&state, &me, second).await.unwrap();
}

#[tokio::test]
async fn degraded_mode_rejects_operations() {
    let (state, _store) = setup().await;
    let me = device("phone");
    state.update_degraded(true).await;

    let err = slot_service::create_slot(&state, &me, CreateSlotRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));
    let err = slot_service::list_slots(&state, &me).await.unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));
}

#[tokio::test]
async fn slot_deletion_requires_confirmation() {
    let (state, store) = setup().await;
    let me = device("phone");
    let slot = new_slot(&state, &me).await;
    workspace_service::open_slot(&state, &me, slot).await.unwrap();

    let err = slot_service::delete_slot(&state, &me, slot, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    slot_service::delete_slot(&state, &me, slot, true)
        .await
        .unwrap();
    assert!(store.find_slot("user-1", slot).await.unwrap().is_none());
    let err = game_service::slot_view(&state, &me, slot).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let err = slot_service::delete_slot(&state, &me, slot, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn closing_the_workspace_releases_subscriptions() {
    let (state, store) = setup().await;
    let me = device("phone");
    let slot = new_slot(&state, &me).await;
    workspace_service::open_slot(&state, &me, slot).await.unwrap();
    assert_eq!(store.listener_count(), 3);

    assert!(workspace_service::close(&state, &me).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.listener_count(), 0);
    assert!(!workspace_service::close(&state, &me).await);
}
