//! Per-device view of a user's data: live slot list and roster, plus the board
//! of the slot opened on that device.

use std::{collections::HashSet, sync::Arc};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    dao::{
        models::{RosterPlayerEntity, SlotEntity},
        score_store::{ScoreStore, subscription::TaskGuard},
    },
    error::ServiceError,
    state::{
        board::{SlotBoard, roster_names},
        sse::SseHub,
    },
};

/// Workspace handle shared between request handlers and listener tasks.
pub type SharedWorkspace = Arc<Mutex<Workspace>>;

/// Identifies one device of one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceKey {
    pub owner: String,
    pub device: String,
}

/// Listener tasks owned by a workspace. Dropping a guard stops its task.
#[derive(Debug, Default)]
pub(crate) struct Listeners {
    pub(crate) slots: Option<TaskGuard>,
    pub(crate) roster: Option<TaskGuard>,
    pub(crate) games: Option<TaskGuard>,
}

/// Local state of one device.
pub struct Workspace {
    key: WorkspaceKey,
    owner_name: String,
    store: Arc<dyn ScoreStore>,
    events: Arc<SseHub>,
    pub(crate) slots: Vec<SlotEntity>,
    pub(crate) roster: Vec<RosterPlayerEntity>,
    pub(crate) board: Option<SlotBoard>,
    pub(crate) listeners: Listeners,
    pub(crate) started: bool,
}

impl Workspace {
    pub fn new(
        key: WorkspaceKey,
        owner_name: String,
        store: Arc<dyn ScoreStore>,
        events: Arc<SseHub>,
    ) -> Self {
        Self {
            key,
            owner_name,
            store,
            events,
            slots: Vec::new(),
            roster: Vec::new(),
            board: None,
            listeners: Listeners::default(),
            started: false,
        }
    }

    pub fn key(&self) -> &WorkspaceKey {
        &self.key
    }

    pub fn owner(&self) -> &str {
        &self.key.owner
    }

    /// Display name last supplied by the identity provider.
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub(crate) fn set_owner_name(&mut self, name: &str) {
        name.clone_into(&mut self.owner_name);
    }

    pub fn store(&self) -> Arc<dyn ScoreStore> {
        self.store.clone()
    }

    /// Whether this workspace reads from `store`.
    pub fn uses_store(&self, store: &Arc<dyn ScoreStore>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.store), Arc::as_ptr(store))
    }

    /// Switch to another store handle. Listeners and the opened board are dropped.
    pub(crate) fn rebind(&mut self, store: Arc<dyn ScoreStore>) {
        self.shutdown();
        self.store = store;
    }

    /// Event hub feeding this device's SSE stream.
    pub fn events(&self) -> Arc<SseHub> {
        self.events.clone()
    }

    pub fn slots(&self) -> &[SlotEntity] {
        &self.slots
    }

    pub fn roster(&self) -> &[RosterPlayerEntity] {
        &self.roster
    }

    pub fn roster_names(&self) -> HashSet<String> {
        roster_names(&self.roster)
    }

    pub fn board(&self) -> Option<&SlotBoard> {
        self.board.as_ref()
    }

    /// Board of `slot_id`, which must be the slot opened on this device.
    pub fn board_mut(&mut self, slot_id: Uuid) -> Result<&mut SlotBoard, ServiceError> {
        match self.board.as_mut() {
            Some(board) if board.slot_id() == slot_id => Ok(board),
            _ => Err(ServiceError::InvalidState(format!(
                "slot `{slot_id}` is not open on this device"
            ))),
        }
    }

    /// Board of `slot_id` together with the roster it is validated against.
    pub fn board_and_roster(
        &mut self,
        slot_id: Uuid,
    ) -> Result<(&mut SlotBoard, &[RosterPlayerEntity]), ServiceError> {
        match self.board.as_mut() {
            Some(board) if board.slot_id() == slot_id => Ok((board, &self.roster)),
            _ => Err(ServiceError::InvalidState(format!(
                "slot `{slot_id}` is not open on this device"
            ))),
        }
    }

    /// Whether a game being entered or edited on this device refers to `name`.
    pub fn references_player(&self, name: &str) -> bool {
        self.board
            .as_ref()
            .is_some_and(|board| board.session_references(name))
    }

    /// Forget the opened slot and stop following its games.
    pub(crate) fn close_board(&mut self) {
        self.listeners.games = None;
        self.board = None;
    }

    /// Stop every listener task.
    pub(crate) fn shutdown(&mut self) {
        self.close_board();
        self.listeners = Listeners::default();
        self.started = false;
    }
}
