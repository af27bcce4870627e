//! Per-slot local state of a device: read-only history, the next-game
//! selection and the in-flight session.

use std::{collections::HashSet, time::SystemTime};

use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::models::{GameEntity, RosterPlayerEntity, SlotEntity},
    error::ServiceError,
    state::{
        session::{LocalSession, SessionKind},
        settlement::MIN_ACTIVE_PLAYERS,
        state_machine::{SlotEvent, SlotPhase, SlotStateMachine},
    },
};

/// Where the current selection was proposed from. Each source seeds at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    /// A game of this slot, settled or resumed.
    Game(Uuid),
    /// The last settled game of the preceding slot.
    PreviousSlot(Uuid),
}

/// Local state for the slot currently opened on a device.
#[derive(Debug)]
pub struct SlotBoard {
    pub(crate) slot: SlotEntity,
    /// Stored games, most recent first.
    pub(crate) games: Vec<GameEntity>,
    pub(crate) selection: Vec<String>,
    pub(crate) session: Option<LocalSession>,
    pub(crate) machine: SlotStateMachine,
    pub(crate) seeded_from: Option<SeedSource>,
}

impl SlotBoard {
    pub fn new(slot: SlotEntity) -> Self {
        Self {
            slot,
            games: Vec::new(),
            selection: Vec::new(),
            session: None,
            machine: SlotStateMachine::new(),
            seeded_from: None,
        }
    }

    pub fn slot(&self) -> &SlotEntity {
        &self.slot
    }

    pub fn slot_id(&self) -> Uuid {
        self.slot.id
    }

    pub fn games(&self) -> &[GameEntity] {
        &self.games
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn session(&self) -> Option<&LocalSession> {
        self.session.as_ref()
    }

    pub fn phase(&self) -> SlotPhase {
        self.machine.phase()
    }

    /// Machine handle for write-backed transitions.
    pub fn machine_mut(&mut self) -> &mut SlotStateMachine {
        &mut self.machine
    }

    /// Whether the in-flight session refers to `name`.
    pub fn session_references(&self, name: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.references(name))
    }

    /// Number the next new game will get.
    pub fn next_game_number(&self) -> u32 {
        self.games
            .iter()
            .map(|g| g.game_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Most recently settled game, the only one that may be edited.
    pub fn last_settled_game(&self) -> Option<&GameEntity> {
        self.games.iter().find(|g| g.is_settled())
    }

    fn unsettled_game(&self) -> Option<&GameEntity> {
        self.games.first().filter(|g| !g.is_settled())
    }

    fn session_mut(&mut self) -> Result<&mut LocalSession, ServiceError> {
        self.session
            .as_mut()
            .ok_or_else(|| ServiceError::InvalidState("no game is being entered".into()))
    }

    /// Replace the selection and fire the matching phase change.
    pub(crate) fn replace_selection(&mut self, names: Vec<String>) -> Result<(), ServiceError> {
        let non_empty = !names.is_empty();
        self.machine.fire(SlotEvent::SelectionChanged { non_empty })?;
        self.selection = names;
        Ok(())
    }

    /// Set the players chosen for the next game. Every name must be on the roster.
    pub fn set_selection(
        &mut self,
        names: Vec<String>,
        roster: &[RosterPlayerEntity],
    ) -> Result<(), ServiceError> {
        let known = roster_names(roster);
        let mut seen = HashSet::new();
        let mut selection = Vec::with_capacity(names.len());
        for name in names {
            if !known.contains(&name) {
                return Err(ServiceError::InvalidInput(format!(
                    "player `{name}` is not on the roster"
                )));
            }
            if seen.insert(name.clone()) {
                selection.push(name);
            }
        }
        self.replace_selection(selection)
    }

    /// Add or remove one roster player from the selection.
    pub fn toggle_selection(
        &mut self,
        name: &str,
        roster: &[RosterPlayerEntity],
    ) -> Result<(), ServiceError> {
        let mut names = self.selection.clone();
        if let Some(index) = names.iter().position(|n| n == name) {
            names.remove(index);
        } else {
            names.push(name.to_string());
        }
        self.set_selection(names, roster)
    }

    /// Start a pending game from the current selection.
    pub fn start_game(
        &mut self,
        roster: &[RosterPlayerEntity],
        is_rotation: bool,
        board_charge: u32,
    ) -> Result<&LocalSession, ServiceError> {
        if self.session.is_some() {
            return Err(ServiceError::InvalidState(
                "another game is already being entered in this slot".into(),
            ));
        }
        if let Some(game) = self.unsettled_game() {
            return Err(ServiceError::InvalidState(format!(
                "game {} is still unsettled; reopen the slot to resume it",
                game.game_number
            )));
        }
        if self.selection.len() < MIN_ACTIVE_PLAYERS {
            return Err(ServiceError::InvalidInput(format!(
                "select at least {MIN_ACTIVE_PLAYERS} players"
            )));
        }
        let known = roster_names(roster);
        if let Some(missing) = self.selection.iter().find(|n| !known.contains(*n)) {
            return Err(ServiceError::InvalidInput(format!(
                "player `{missing}` is not on the roster"
            )));
        }

        self.machine.fire(SlotEvent::StartGame)?;
        let session = LocalSession::new_game(
            &self.selection,
            self.next_game_number(),
            is_rotation,
            board_charge,
        );
        debug!(slot_id = %self.slot.id, game_number = session.game_number, "game started");
        Ok(&*self.session.insert(session))
    }

    pub fn set_points(&mut self, name: &str, points: u32) -> Result<(), ServiceError> {
        Ok(self.session_mut()?.set_points(name, points)?)
    }

    pub fn drop_player(&mut self, name: &str) -> Result<(), ServiceError> {
        Ok(self.session_mut()?.drop_player(name)?)
    }

    pub fn set_rotation(&mut self, value: bool) -> Result<(), ServiceError> {
        self.session_mut()?.is_rotation = value;
        Ok(())
    }

    pub fn set_board_charge(&mut self, value: u32) -> Result<(), ServiceError> {
        self.session_mut()?.board_charge = value;
        Ok(())
    }

    /// Re-open a settled game. Only the most recently settled game qualifies.
    pub fn begin_edit(&mut self, game_id: Uuid) -> Result<&LocalSession, ServiceError> {
        if self.session.is_some() {
            return Err(ServiceError::InvalidState(
                "finish or cancel the current game first".into(),
            ));
        }
        let game = self
            .games
            .iter()
            .find(|g| g.id == game_id)
            .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;
        if self.last_settled_game().map(|g| g.id) != Some(game.id) {
            return Err(ServiceError::InvalidState(
                "only the most recently settled game can be edited".into(),
            ));
        }

        let session = LocalSession::edit(game);
        self.machine.fire(SlotEvent::BeginEdit)?;
        Ok(&*self.session.insert(session))
    }

    /// Discard the pending game or the edit. Nothing is written.
    pub fn cancel(&mut self) -> Result<(), ServiceError> {
        let event = match self.session.as_ref().map(|s| &s.kind) {
            Some(SessionKind::Pending { .. }) => SlotEvent::Cancel,
            Some(SessionKind::Editing { .. }) => SlotEvent::CancelEdit,
            None => {
                return Err(ServiceError::InvalidState("no game is being entered".into()));
            }
        };
        self.machine.fire(event)?;
        self.session = None;
        let selection = std::mem::take(&mut self.selection);
        self.replace_selection(selection)
    }

    /// Validate the session and build the record to write, together with the
    /// write-backed event to plan.
    pub fn prepare_settlement(
        &self,
        now: SystemTime,
    ) -> Result<(SlotEvent, GameEntity), ServiceError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidState("no game is being entered".into()))?;
        let event = if session.is_editing() {
            SlotEvent::SaveEdit
        } else {
            SlotEvent::Settle
        };
        Ok((event, session.to_record(self.slot.id, now)?))
    }

    /// Record a written game locally once the store accepted it.
    ///
    /// A newly settled game seeds the next selection from its players.
    pub fn complete_settlement(
        &mut self,
        record: GameEntity,
        roster: &[RosterPlayerEntity],
    ) -> Result<(), ServiceError> {
        let was_editing = self.session.as_ref().is_some_and(LocalSession::is_editing);
        self.session = None;
        self.upsert_game(record.clone());

        let selection = if was_editing {
            std::mem::take(&mut self.selection)
        } else {
            self.seeded_from = Some(SeedSource::Game(record.id));
            seed_names(&record, &roster_names(roster))
        };
        self.replace_selection(selection)
    }

    fn upsert_game(&mut self, record: GameEntity) {
        match self.games.iter_mut().find(|g| g.id == record.id) {
            Some(existing) => *existing = record,
            None => self.games.push(record),
        }
        self.games.sort_by(|a, b| b.game_number.cmp(&a.game_number));
    }
}

/// Names present on the roster.
pub fn roster_names(roster: &[RosterPlayerEntity]) -> HashSet<String> {
    roster.iter().map(|p| p.name.clone()).collect()
}

/// Players of `game` still on the roster, in game order.
pub(crate) fn seed_names(game: &GameEntity, known: &HashSet<String>) -> Vec<String> {
    game.player_names()
        .into_iter()
        .filter(|name| known.contains(name))
        .collect()
}
