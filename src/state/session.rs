use std::{collections::HashSet, time::SystemTime};

use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::GameEntity,
    state::settlement::{self, SessionPlayer, SettlementError},
};

/// Below this many active players nobody can be dropped.
const MIN_ACTIVE_FOR_DROP: usize = 3;

/// What the local session will write once saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    /// A new game, or an unsettled game found in the store and resumed.
    Pending {
        /// Identifier of the stored unsettled game being resumed, if any.
        resumed_game: Option<Uuid>,
    },
    /// Re-entry of a settled game; saving overwrites `original`.
    Editing { original: GameEntity },
}

/// Errors raised by edits to a local session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("player `{0}` is not part of this game")]
    UnknownPlayer(String),
    #[error("player `{0}` has dropped")]
    PlayerDropped(String),
    #[error("player `{0}` must have 0 points to drop")]
    NonzeroEntry(String),
    #[error("at least {MIN_ACTIVE_FOR_DROP} active players are needed to drop one")]
    TooFewActivePlayers,
    #[error("player `{0}` is the designated winner")]
    DesignatedWinner(String),
    #[error("dropping `{0}` would leave the game decided by default")]
    WinnerByDefault(String),
}

/// In-flight game entry that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSession {
    pub kind: SessionKind,
    pub players: Vec<SessionPlayer>,
    pub is_rotation: bool,
    pub board_charge: u32,
    pub game_number: u32,
    /// Creation time recorded on the written game.
    pub started_at: SystemTime,
}

impl LocalSession {
    /// Start a brand new game with every player at 0.
    pub fn new_game(
        names: &[String],
        game_number: u32,
        is_rotation: bool,
        board_charge: u32,
    ) -> Self {
        Self {
            kind: SessionKind::Pending { resumed_game: None },
            players: names.iter().map(SessionPlayer::new).collect(),
            is_rotation,
            board_charge,
            game_number,
            started_at: SystemTime::now(),
        }
    }

    /// Pick up an unsettled game found in the store.
    pub fn resume(game: &GameEntity) -> Self {
        Self {
            kind: SessionKind::Pending {
                resumed_game: Some(game.id),
            },
            players: settlement::entries_from_scores(&game.players, None),
            is_rotation: game.is_rotation_game,
            board_charge: game.board_charge,
            game_number: game.game_number,
            started_at: game.created_at,
        }
    }

    /// Re-open a settled game with its entries rebuilt from the stored scores.
    pub fn edit(game: &GameEntity) -> Self {
        Self {
            players: settlement::entries_from_scores(
                &game.players,
                game.winner_player_name.as_deref(),
            ),
            is_rotation: game.is_rotation_game,
            board_charge: game.board_charge,
            game_number: game.game_number,
            started_at: game.created_at,
            kind: SessionKind::Editing {
                original: game.clone(),
            },
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.kind, SessionKind::Editing { .. })
    }

    /// Whether the session refers to `name`.
    pub fn references(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_active()).count()
    }

    fn player_mut(&mut self, name: &str) -> Result<&mut SessionPlayer, SessionError> {
        self.players
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| SessionError::UnknownPlayer(name.to_string()))
    }

    /// Record the points lost by a player.
    pub fn set_points(&mut self, name: &str, points: u32) -> Result<(), SessionError> {
        let player = self.player_mut(name)?;
        if player.dropped {
            return Err(SessionError::PlayerDropped(name.to_string()));
        }
        player.points_lost = points;
        Ok(())
    }

    /// Mark a player as dropped; their entry is reset to 0.
    pub fn drop_player(&mut self, name: &str) -> Result<(), SessionError> {
        let active = self.active_count();
        let winner = settlement::designated_winner(&self.players).map(str::to_owned);

        let player = self.player_mut(name)?;
        if player.dropped {
            return Err(SessionError::PlayerDropped(name.to_string()));
        }
        if player.points_lost != 0 {
            return Err(SessionError::NonzeroEntry(name.to_string()));
        }
        if active < MIN_ACTIVE_FOR_DROP {
            return Err(SessionError::TooFewActivePlayers);
        }

        let others_all_entered = self
            .players
            .iter()
            .filter(|p| p.is_active() && p.name != name)
            .all(|p| p.points_lost != 0);
        if winner.as_deref() == Some(name) && others_all_entered {
            return Err(SessionError::DesignatedWinner(name.to_string()));
        }

        let remaining = self
            .players
            .iter()
            .filter(|p| p.is_active() && p.name != name)
            .collect::<Vec<_>>();
        let remaining_zero = remaining.iter().filter(|p| p.points_lost == 0).count();
        if remaining.len() == MIN_ACTIVE_FOR_DROP - 1 && remaining_zero == 1 {
            return Err(SessionError::WinnerByDefault(name.to_string()));
        }

        let player = self.player_mut(name)?;
        player.dropped = true;
        player.points_lost = 0;
        Ok(())
    }

    /// Keep only players whose name is still listed, leaving entries untouched.
    /// Returns whether anything was removed.
    pub fn retain_players(&mut self, names: &HashSet<String>) -> bool {
        let before = self.players.len();
        self.players.retain(|p| names.contains(&p.name));
        before != self.players.len()
    }

    /// Build the record to write for this session.
    ///
    /// New games get a fresh identifier; resumed and edited games keep theirs.
    /// Edits preserve the original end time.
    pub fn to_record(&self, slot_id: Uuid, now: SystemTime) -> Result<GameEntity, SettlementError> {
        let outcome = settlement::settle(&self.players, self.board_charge)?;

        let (id, created_at, ended_at) = match &self.kind {
            SessionKind::Pending { resumed_game } => {
                (resumed_game.unwrap_or_else(Uuid::new_v4), self.started_at, now)
            }
            SessionKind::Editing { original } => (
                original.id,
                self.started_at,
                original.ended_at.unwrap_or(now),
            ),
        };

        Ok(GameEntity {
            id,
            slot_id,
            game_number: self.game_number,
            players: outcome.players,
            winner_player_name: Some(outcome.winner),
            points_transferred: outcome.points_transferred,
            board_charge: self.board_charge,
            is_rotation_game: self.is_rotation,
            created_at,
            ended_at: Some(ended_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(entries: &[(&str, u32)]) -> LocalSession {
        let names = entries.iter().map(|(n, _)| n.to_string()).collect::<Vec<_>>();
        let mut session = LocalSession::new_game(&names, 1, false, 0);
        for (name, points) in entries {
            session.set_points(name, *points).unwrap();
        }
        session
    }

    #[test]
    fn drop_resets_entry_and_marks_player() {
        let mut s = session(&[("A", 10), ("B", 0), ("C", 15), ("D", 0)]);
        // Three active players remain after dropping D.
        s.drop_player("D").unwrap();
        let d = &s.players[3];
        assert!(d.dropped);
        assert_eq!(d.points_lost, 0);
        assert_eq!(s.set_points("D", 3), Err(SessionError::PlayerDropped("D".into())));
    }

    #[test]
    fn drop_refused_with_nonzero_entry() {
        let mut s = session(&[("A", 10), ("B", 0), ("C", 0)]);
        assert_eq!(s.drop_player("A"), Err(SessionError::NonzeroEntry("A".into())));
    }

    #[test]
    fn drop_refused_below_three_active_players() {
        let mut s = session(&[("A", 0), ("B", 0)]);
        assert_eq!(s.drop_player("A"), Err(SessionError::TooFewActivePlayers));
    }

    #[test]
    fn drop_refused_for_designated_winner() {
        let mut s = session(&[("A", 10), ("B", 5), ("C", 0), ("D", 2)]);
        assert_eq!(s.drop_player("C"), Err(SessionError::DesignatedWinner("C".into())));
    }

    #[test]
    fn drop_refused_when_two_remain_with_single_zero() {
        // A=10, B=0, D=0: dropping D leaves A and B, B winning by default.
        let mut s = session(&[("A", 10), ("B", 0), ("D", 0)]);
        assert_eq!(s.drop_player("D"), Err(SessionError::WinnerByDefault("D".into())));

        // A=0, B=0, D=0: two undecided players would remain.
        let mut s = session(&[("A", 0), ("B", 0), ("D", 0)]);
        s.drop_player("D").unwrap();
    }

    #[test]
    fn unknown_and_already_dropped_players_are_refused() {
        let mut s = session(&[("A", 0), ("B", 0), ("C", 0), ("D", 0)]);
        assert_eq!(s.drop_player("Z"), Err(SessionError::UnknownPlayer("Z".into())));
        s.drop_player("D").unwrap();
        assert_eq!(s.drop_player("D"), Err(SessionError::PlayerDropped("D".into())));
    }

    #[test]
    fn edit_then_save_reproduces_the_stored_game() {
        let mut s = session(&[("A", 10), ("B", 20), ("C", 0), ("D", 0)]);
        s.board_charge = 5;
        s.drop_player("D").unwrap();
        let slot_id = Uuid::new_v4();
        let stored = s.to_record(slot_id, SystemTime::now()).unwrap();

        let edit = LocalSession::edit(&stored);
        assert!(edit.is_editing());
        let saved = edit.to_record(slot_id, SystemTime::now()).unwrap();
        assert_eq!(saved, stored);
    }

    #[test]
    fn resumed_game_keeps_its_identifier() {
        let mut game = session(&[("A", 4), ("B", 0)])
            .to_record(Uuid::new_v4(), SystemTime::now())
            .unwrap();
        game.ended_at = None;
        game.winner_player_name = None;

        let resumed = LocalSession::resume(&game);
        assert_eq!(resumed.players[0].points_lost, 4);
        let record = resumed.to_record(game.slot_id, SystemTime::now()).unwrap();
        assert_eq!(record.id, game.id);
        assert_eq!(record.created_at, game.created_at);
        assert!(record.is_settled());
    }

    #[test]
    fn roster_filter_keeps_entries() {
        let mut s = session(&[("A", 4), ("B", 0), ("C", 7)]);
        let names = ["A", "C"].iter().map(|n| n.to_string()).collect();
        assert!(s.retain_players(&names));
        assert_eq!(
            s.players
                .iter()
                .map(|p| (p.name.as_str(), p.points_lost))
                .collect::<Vec<_>>(),
            vec![("A", 4), ("C", 7)]
        );
    }
}
