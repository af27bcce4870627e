//! Merging live store snapshots into a [`SlotBoard`] without clobbering what
//! the user is entering.

use std::collections::HashSet;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::{GameEntity, SlotEntity},
    error::ServiceError,
    state::{
        board::{SeedSource, SlotBoard, seed_names},
        session::{LocalSession, SessionKind},
        state_machine::SlotEvent,
    },
};

/// What a games snapshot did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamesOutcome {
    /// Only the read-only history was replaced.
    HistoryOnly,
    /// An unsettled stored game became the local session.
    Resumed(Uuid),
    /// The next selection was proposed from a settled game.
    Seeded(Uuid),
    /// The slot has no games yet; the preceding slot should be consulted.
    NeedsPreviousSlot,
}

impl SlotBoard {
    /// Take in a fresh snapshot of this slot's games (most recent first).
    pub fn apply_games_snapshot(
        &mut self,
        games: Vec<GameEntity>,
        roster: &HashSet<String>,
    ) -> Result<GamesOutcome, ServiceError> {
        self.games = games;

        if self.session.is_some() {
            return Ok(GamesOutcome::HistoryOnly);
        }

        let Some(latest) = self.games.first() else {
            return Ok(if self.seeded_from.is_none() {
                GamesOutcome::NeedsPreviousSlot
            } else {
                GamesOutcome::HistoryOnly
            });
        };

        let source = SeedSource::Game(latest.id);
        if self.seeded_from == Some(source) {
            return Ok(GamesOutcome::HistoryOnly);
        }

        if latest.is_settled() {
            let id = latest.id;
            let names = seed_names(latest, roster);
            self.replace_selection(names)?;
            self.seeded_from = Some(source);
            debug!(slot_id = %self.slot.id, game_id = %id, "selection seeded from last game");
            Ok(GamesOutcome::Seeded(id))
        } else {
            let session = LocalSession::resume(latest);
            let id = latest.id;
            self.machine.fire(SlotEvent::ResumeGame)?;
            self.session = Some(session);
            self.seeded_from = Some(source);
            info!(slot_id = %self.slot.id, game_id = %id, "resumed unsettled game");
            Ok(GamesOutcome::Resumed(id))
        }
    }

    /// Propose a default selection from the preceding slot's last settled game.
    /// Returns whether the selection changed.
    pub fn seed_from_previous_slot(
        &mut self,
        previous_slot: Uuid,
        previous_games: &[GameEntity],
        roster: &HashSet<String>,
    ) -> Result<bool, ServiceError> {
        if self.session.is_some() || !self.games.is_empty() || self.seeded_from.is_some() {
            return Ok(false);
        }
        self.seeded_from = Some(SeedSource::PreviousSlot(previous_slot));

        let Some(last) = previous_games.iter().find(|g| g.is_settled()) else {
            return Ok(false);
        };
        let names = seed_names(last, roster);
        if names.is_empty() {
            return Ok(false);
        }
        self.replace_selection(names)?;
        Ok(true)
    }

    /// Re-filter the session players and the selection against the roster.
    /// Entered points are kept. Returns whether anything changed.
    pub fn apply_roster(&mut self, roster: &HashSet<String>) -> Result<bool, ServiceError> {
        let before = self.selection.len();
        self.selection.retain(|name| roster.contains(name));
        let selection_changed = before != self.selection.len();

        match self.session.as_mut() {
            Some(session) if matches!(session.kind, SessionKind::Pending { .. }) => {
                Ok(session.retain_players(roster) || selection_changed)
            }
            // Edits keep their players so the stored record can be saved back as it was.
            Some(_) => Ok(selection_changed),
            None => {
                if selection_changed {
                    let selection = std::mem::take(&mut self.selection);
                    self.replace_selection(selection)?;
                }
                Ok(selection_changed)
            }
        }
    }
}

/// Slot created just before `slot_id`, given slots ordered newest first.
pub fn previous_slot(slots: &[SlotEntity], slot_id: Uuid) -> Option<&SlotEntity> {
    let index = slots.iter().position(|s| s.id == slot_id)?;
    slots.get(index + 1)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::{
        dao::models::{GamePlayerEntity, RosterPlayerEntity},
        state::state_machine::SlotPhase,
    };

    fn slot() -> SlotEntity {
        SlotEntity {
            id: Uuid::new_v4(),
            slot_number: 1,
            date: "2026-10-19".into(),
            created_at: SystemTime::now(),
            owner_name: "Alice".into(),
            drop_value: 1,
        }
    }

    fn roster(names: &[&str]) -> Vec<RosterPlayerEntity> {
        names
            .iter()
            .map(|name| RosterPlayerEntity {
                id: Uuid::new_v4(),
                name: name.to_string(),
                created_at: SystemTime::now(),
            })
            .collect()
    }

    fn names(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn game(slot_id: Uuid, number: u32, scores: &[(&str, i64)], settled: bool) -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            slot_id,
            game_number: number,
            players: scores
                .iter()
                .map(|(name, score)| GamePlayerEntity {
                    name: name.to_string(),
                    score: *score,
                    dropped: false,
                })
                .collect(),
            winner_player_name: None,
            points_transferred: 0,
            board_charge: 0,
            is_rotation_game: false,
            created_at: SystemTime::now(),
            ended_at: settled.then(SystemTime::now),
        }
    }

    #[test]
    fn settled_game_seeds_selection_once() {
        let mut board = SlotBoard::new(slot());
        let known = names(&["A", "B", "C"]);
        let g1 = game(board.slot_id(), 1, &[("A", -3), ("B", 3)], true);

        let outcome = board.apply_games_snapshot(vec![g1.clone()], &known).unwrap();
        assert_eq!(outcome, GamesOutcome::Seeded(g1.id));
        assert_eq!(board.selection(), ["A", "B"]);
        assert_eq!(board.phase(), SlotPhase::Setup);

        // The user adjusts the selection; the same snapshot must not undo it.
        board
            .set_selection(vec!["A".into(), "C".into()], &roster(&["A", "B", "C"]))
            .unwrap();
        let outcome = board.apply_games_snapshot(vec![g1], &known).unwrap();
        assert_eq!(outcome, GamesOutcome::HistoryOnly);
        assert_eq!(board.selection(), ["A", "C"]);
    }

    #[test]
    fn unsettled_game_is_resumed() {
        let mut board = SlotBoard::new(slot());
        let open = game(board.slot_id(), 2, &[("A", -4), ("B", 0)], false);
        let done = game(board.slot_id(), 1, &[("A", -1), ("B", 1)], true);

        let outcome = board
            .apply_games_snapshot(vec![open.clone(), done], &names(&["A", "B"]))
            .unwrap();
        assert_eq!(outcome, GamesOutcome::Resumed(open.id));
        assert_eq!(board.phase(), SlotPhase::Active);
        let session = board.session().unwrap();
        assert_eq!(session.game_number, 2);
        assert_eq!(session.players[0].points_lost, 4);
    }

    #[test]
    fn snapshots_only_replace_history_while_entering() {
        let roster_entries = roster(&["A", "B"]);
        let known = names(&["A", "B"]);
        let mut board = SlotBoard::new(slot());
        board
            .set_selection(vec!["A".into(), "B".into()], &roster_entries)
            .unwrap();
        board.start_game(&roster_entries, false, 0).unwrap();
        board.set_points("A", 9).unwrap();

        let remote = game(board.slot_id(), 1, &[("A", -2), ("B", 2)], true);
        let outcome = board.apply_games_snapshot(vec![remote], &known).unwrap();
        assert_eq!(outcome, GamesOutcome::HistoryOnly);
        assert_eq!(board.games().len(), 1);
        assert_eq!(board.session().unwrap().players[0].points_lost, 9);
        assert_eq!(board.phase(), SlotPhase::Active);
    }

    #[test]
    fn empty_slot_asks_for_previous_slot_then_seeds_once() {
        let mut board = SlotBoard::new(slot());
        let known = names(&["A", "B", "C"]);
        assert_eq!(
            board.apply_games_snapshot(Vec::new(), &known).unwrap(),
            GamesOutcome::NeedsPreviousSlot
        );

        let previous = Uuid::new_v4();
        let unsettled = game(previous, 3, &[("C", 0)], false);
        let settled = game(previous, 2, &[("B", -5), ("C", 5)], true);
        assert!(
            board
                .seed_from_previous_slot(previous, &[unsettled, settled], &known)
                .unwrap()
        );
        assert_eq!(board.selection(), ["B", "C"]);

        assert_eq!(
            board.apply_games_snapshot(Vec::new(), &known).unwrap(),
            GamesOutcome::HistoryOnly
        );
    }

    #[test]
    fn roster_snapshot_filters_session_without_resetting_points() {
        let roster_entries = roster(&["A", "B", "C"]);
        let mut board = SlotBoard::new(slot());
        board
            .set_selection(vec!["A".into(), "B".into(), "C".into()], &roster_entries)
            .unwrap();
        board.start_game(&roster_entries, false, 0).unwrap();
        board.set_points("A", 6).unwrap();

        assert!(board.apply_roster(&names(&["A", "B"])).unwrap());
        let session = board.session().unwrap();
        assert_eq!(session.players.len(), 2);
        assert_eq!(session.players[0].points_lost, 6);
        assert_eq!(board.selection(), ["A", "B"]);
    }

    #[test]
    fn roster_snapshot_leaves_an_edit_untouched() {
        let mut board = SlotBoard::new(slot());
        let mut settled = game(board.slot_id(), 1, &[("A", -3), ("B", 3)], true);
        settled.winner_player_name = Some("B".into());
        board
            .apply_games_snapshot(vec![settled.clone()], &names(&["A", "B"]))
            .unwrap();
        board.begin_edit(settled.id).unwrap();

        assert!(board.apply_roster(&names(&["A"])).unwrap());
        assert_eq!(board.selection(), ["A"]);
        assert_eq!(board.phase(), SlotPhase::Editing);
        let session = board.session().unwrap();
        assert!(session.is_editing());
        assert_eq!(session.players.len(), 2);
        assert_eq!(session.players[0].points_lost, 3);
    }

    #[test]
    fn roster_snapshot_can_empty_the_selection() {
        let mut board = SlotBoard::new(slot());
        board
            .set_selection(vec!["A".into()], &roster(&["A"]))
            .unwrap();
        assert_eq!(board.phase(), SlotPhase::Setup);

        assert!(board.apply_roster(&names(&["B"])).unwrap());
        assert!(board.selection().is_empty());
        assert_eq!(board.phase(), SlotPhase::NoActiveGame);
    }

    #[test]
    fn previous_slot_is_the_next_older_one() {
        let newer = slot();
        let mut older = slot();
        older.created_at -= Duration::from_secs(3600);
        let slots = vec![newer.clone(), older.clone()];

        assert_eq!(previous_slot(&slots, newer.id), Some(&older));
        assert_eq!(previous_slot(&slots, older.id), None);
    }
}
