//! Zero-sum settlement of a finished game.
//!
//! Every non-dropped player except the winner enters the points they lost; the
//! winner collects the sum of those losses minus the board charge. Dropped
//! players settle to zero.

use thiserror::Error;

use crate::dao::models::GamePlayerEntity;

/// Minimum number of non-dropped players for a game to be settled.
pub const MIN_ACTIVE_PLAYERS: usize = 2;

/// Points entered for one participant of a game in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlayer {
    pub name: String,
    /// Points lost, as typed by the user. Zero designates the winner.
    pub points_lost: u32,
    pub dropped: bool,
}

impl SessionPlayer {
    /// Fresh participant with no points entered.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points_lost: 0,
            dropped: false,
        }
    }

    /// Whether the player still takes part in the settlement.
    pub fn is_active(&self) -> bool {
        !self.dropped
    }
}

/// Reasons a game cannot be settled yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("at least {MIN_ACTIVE_PLAYERS} active players are required (got {active})")]
    NotEnoughPlayers { active: usize },
    #[error("no winner: exactly one active player must have 0 points")]
    NoWinner,
    #[error("points missing: only one active player may have 0 points ({})", .candidates.join(", "))]
    AmbiguousWinner { candidates: Vec<String> },
    #[error("scores do not balance: total {total}, expected {expected}")]
    Unbalanced { total: i64, expected: i64 },
}

/// Outcome of a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Final signed scores, in the order of the input.
    pub players: Vec<GamePlayerEntity>,
    pub winner: String,
    /// Gross sum of the points lost by the losers.
    pub points_transferred: i64,
}

/// Name of the single active player with a zero entry, provided every other
/// active player has a nonzero one.
pub fn designated_winner(players: &[SessionPlayer]) -> Option<&str> {
    let mut zero = players
        .iter()
        .filter(|p| p.is_active() && p.points_lost == 0);
    match (zero.next(), zero.next()) {
        (Some(winner), None) => Some(winner.name.as_str()),
        _ => None,
    }
}

/// Compute final scores.
pub fn settle(players: &[SessionPlayer], board_charge: u32) -> Result<Settlement, SettlementError> {
    let active = players.iter().filter(|p| p.is_active()).count();
    if active < MIN_ACTIVE_PLAYERS {
        return Err(SettlementError::NotEnoughPlayers { active });
    }

    let candidates = players
        .iter()
        .filter(|p| p.is_active() && p.points_lost == 0)
        .map(|p| p.name.clone())
        .collect::<Vec<_>>();
    let winner = match candidates.len() {
        0 => return Err(SettlementError::NoWinner),
        1 => candidates[0].clone(),
        _ => return Err(SettlementError::AmbiguousWinner { candidates }),
    };

    let points_transferred = players
        .iter()
        .filter(|p| p.is_active())
        .map(|p| i64::from(p.points_lost))
        .sum::<i64>();
    let winner_score = points_transferred - i64::from(board_charge);

    let final_players = players
        .iter()
        .map(|p| {
            let score = if p.dropped {
                0
            } else if p.name == winner {
                winner_score
            } else {
                -i64::from(p.points_lost)
            };
            GamePlayerEntity {
                name: p.name.clone(),
                score,
                dropped: p.dropped,
            }
        })
        .collect::<Vec<_>>();

    let total = final_players.iter().map(|p| p.score).sum::<i64>();
    let expected = -i64::from(board_charge);
    if total != expected {
        return Err(SettlementError::Unbalanced { total, expected });
    }

    Ok(Settlement {
        players: final_players,
        winner,
        points_transferred,
    })
}

/// Rebuild entry values from stored scores: the winner shows 0, losers the
/// points they lost and dropped players 0.
///
/// The winner is matched by name since a board charge larger than the losses
/// leaves the winner with a negative score.
pub fn entries_from_scores(players: &[GamePlayerEntity], winner: Option<&str>) -> Vec<SessionPlayer> {
    players
        .iter()
        .map(|p| SessionPlayer {
            name: p.name.clone(),
            points_lost: if p.dropped || p.score >= 0 || winner == Some(p.name.as_str()) {
                0
            } else {
                u32::try_from(p.score.unsigned_abs()).unwrap_or(u32::MAX)
            },
            dropped: p.dropped,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, points: u32) -> SessionPlayer {
        SessionPlayer {
            name: name.into(),
            points_lost: points,
            dropped: false,
        }
    }

    fn dropped(name: &str) -> SessionPlayer {
        SessionPlayer {
            dropped: true,
            ..SessionPlayer::new(name)
        }
    }

    fn scores(settlement: &Settlement) -> Vec<(&str, i64)> {
        settlement
            .players
            .iter()
            .map(|p| (p.name.as_str(), p.score))
            .collect()
    }

    #[test]
    fn winner_collects_losses_minus_board_charge() {
        let players = [entry("A", 10), entry("B", 20), entry("C", 0)];
        let settlement = settle(&players, 5).unwrap();

        assert_eq!(settlement.winner, "C");
        assert_eq!(settlement.points_transferred, 30);
        assert_eq!(scores(&settlement), vec![("A", -10), ("B", -20), ("C", 25)]);
        assert_eq!(settlement.players.iter().map(|p| p.score).sum::<i64>(), -5);
    }

    #[test]
    fn dropped_players_settle_to_zero() {
        let players = [entry("A", 7), dropped("B"), entry("C", 0)];
        let settlement = settle(&players, 0).unwrap();

        assert_eq!(scores(&settlement), vec![("A", -7), ("B", 0), ("C", 7)]);
        assert!(settlement.players[1].dropped);
    }

    #[test]
    fn requires_two_active_players() {
        let players = [entry("A", 0), dropped("B")];
        assert_eq!(
            settle(&players, 0),
            Err(SettlementError::NotEnoughPlayers { active: 1 })
        );
    }

    #[test]
    fn requires_exactly_one_zero_entry() {
        assert_eq!(
            settle(&[entry("A", 3), entry("B", 4)], 0),
            Err(SettlementError::NoWinner)
        );
        assert_eq!(
            settle(&[entry("A", 0), entry("B", 0), entry("C", 2)], 0),
            Err(SettlementError::AmbiguousWinner {
                candidates: vec!["A".into(), "B".into()]
            })
        );
    }

    #[test]
    fn dropped_zero_entry_is_not_a_winner_candidate() {
        let players = [dropped("A"), entry("B", 0), entry("C", 4)];
        assert_eq!(designated_winner(&players), Some("B"));
        assert_eq!(settle(&players, 0).unwrap().winner, "B");
    }

    #[test]
    fn stored_scores_rebuild_the_original_entries() {
        let players = [entry("A", 10), dropped("D"), entry("B", 20), entry("C", 0)];
        let settlement = settle(&players, 5).unwrap();

        let rebuilt = entries_from_scores(&settlement.players, Some(&settlement.winner));
        assert_eq!(rebuilt, players.to_vec());
        assert_eq!(settle(&rebuilt, 5).unwrap(), settlement);
    }

    #[test]
    fn board_charge_above_losses_leaves_winner_negative() {
        let players = [entry("A", 2), entry("B", 0)];
        let settlement = settle(&players, 5).unwrap();
        assert_eq!(scores(&settlement), vec![("A", -2), ("B", -3)]);

        let rebuilt = entries_from_scores(&settlement.players, Some("B"));
        assert_eq!(rebuilt, players.to_vec());
    }
}
