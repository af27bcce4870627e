use std::collections::BTreeMap;

use crate::dao::models::GameEntity;

/// Running total of one player over a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub name: String,
    pub total: i64,
    /// Settled games the player took part in without dropping.
    pub games_played: u32,
    pub wins: u32,
}

/// Totals over the settled games of a slot, sorted by name. Unsettled games do not count.
pub fn compute(games: &[GameEntity]) -> Vec<Standing> {
    let mut totals: BTreeMap<&str, Standing> = BTreeMap::new();

    for game in games.iter().filter(|g| g.is_settled()) {
        for player in &game.players {
            let entry = totals.entry(player.name.as_str()).or_insert_with(|| Standing {
                name: player.name.clone(),
                total: 0,
                games_played: 0,
                wins: 0,
            });
            entry.total += player.score;
            if !player.dropped {
                entry.games_played += 1;
            }
            if game.winner_player_name.as_deref() == Some(player.name.as_str()) {
                entry.wins += 1;
            }
        }
    }

    totals.into_values().collect()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::dao::models::GamePlayerEntity;

    fn game(scores: &[(&str, i64, bool)], winner: &str, settled: bool) -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            slot_id: Uuid::nil(),
            game_number: 1,
            players: scores
                .iter()
                .map(|(name, score, dropped)| GamePlayerEntity {
                    name: name.to_string(),
                    score: *score,
                    dropped: *dropped,
                })
                .collect(),
            winner_player_name: Some(winner.into()),
            points_transferred: 0,
            board_charge: 0,
            is_rotation_game: false,
            created_at: SystemTime::now(),
            ended_at: settled.then(SystemTime::now),
        }
    }

    #[test]
    fn totals_only_count_settled_games() {
        let games = vec![
            game(&[("Carl", 5, false), ("Bea", -5, false)], "Carl", false),
            game(&[("Carl", -4, false), ("Bea", 4, false), ("Al", 0, true)], "Bea", true),
            game(&[("Bea", -2, false), ("Al", 2, false)], "Al", true),
        ];

        let standings = compute(&games);
        let summary = standings
            .iter()
            .map(|s| (s.name.as_str(), s.total, s.games_played, s.wins))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![("Al", 2, 1, 1), ("Bea", 2, 2, 1), ("Carl", -4, 1, 0)]
        );
    }
}
