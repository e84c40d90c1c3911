// Points aggregation: turn a saved squad plus chips and transfer penalty into
// a gameweek score.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chips::{ChipKind, ChipsUsed};
use crate::error::{ensure_valid_gameweek, RulesError, SquadProblem};
use crate::sources::PlayerPointsSource;
use crate::state::Gameweek;

/// Maximum number of players in a squad.
pub const SQUAD_SIZE: usize = 15;

/// Number of players whose points count every gameweek.
pub const STARTING_XI: usize = 11;

const CAPTAIN_MULTIPLIER: i32 = 2;
const TRIPLE_CAPTAIN_MULTIPLIER: i32 = 3;

// ---------------------------------------------------------------------------
// Squad
// ---------------------------------------------------------------------------

/// One player in a saved squad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadPlayer {
    pub player_id: String,
    pub is_starting: bool,
}

/// A manager's squad as saved for one gameweek.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Squad {
    pub players: Vec<SquadPlayer>,
    pub captain_id: String,
}

impl Squad {
    /// Build a squad from starter ids, bench ids, and the captain's id.
    pub fn new(starters: &[&str], bench: &[&str], captain_id: &str) -> Self {
        let players = starters
            .iter()
            .map(|id| (id, true))
            .chain(bench.iter().map(|id| (id, false)))
            .map(|(id, is_starting)| SquadPlayer {
                player_id: id.to_string(),
                is_starting,
            })
            .collect();
        Squad {
            players,
            captain_id: captain_id.to_string(),
        }
    }

    pub fn starters(&self) -> impl Iterator<Item = &SquadPlayer> {
        self.players.iter().filter(|p| p.is_starting)
    }

    pub fn bench(&self) -> impl Iterator<Item = &SquadPlayer> {
        self.players.iter().filter(|p| !p.is_starting)
    }

    /// Structural checks the aggregator relies on.
    ///
    /// Budget, position and club limits belong to the squad validator
    /// upstream and are not checked here.
    pub fn validate(&self) -> Result<(), SquadProblem> {
        if self.players.len() > SQUAD_SIZE {
            return Err(SquadProblem::TooManyPlayers(self.players.len()));
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            if !seen.insert(player.player_id.as_str()) {
                return Err(SquadProblem::DuplicatePlayer(player.player_id.clone()));
            }
        }

        let starter_count = self.starters().count();
        if starter_count != STARTING_XI {
            return Err(SquadProblem::WrongStarterCount(starter_count));
        }

        if !self.starters().any(|p| p.player_id == self.captain_id) {
            return Err(SquadProblem::CaptainNotStarting(self.captain_id.clone()));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Breakdown of a manager's score for one gameweek.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameweekScore {
    pub gameweek: Gameweek,
    /// Starting XI points including the captain bonus.
    pub starting_total: i32,
    /// Raw bench points. Only part of `final_score` under bench boost.
    pub bench_total: i32,
    pub bench_boost_applied: bool,
    pub captain_multiplier: i32,
    pub transfer_penalty: u32,
    /// May be negative when the penalty outweighs the points scored.
    pub final_score: i32,
    /// Players with no points recorded for the gameweek (counted as 0).
    #[serde(default)]
    pub missing_players: Vec<String>,
}

/// Score `squad` for `gameweek`.
///
/// Missing player points count as zero. The squad must have eleven starters
/// with the captain among them; anything else is rejected rather than scored.
pub fn score_gameweek<P>(
    squad: &Squad,
    points: &P,
    chips: &ChipsUsed,
    gameweek: Gameweek,
    points_deducted: u32,
) -> Result<GameweekScore, RulesError>
where
    P: PlayerPointsSource + ?Sized,
{
    ensure_valid_gameweek(gameweek)?;
    squad.validate().map_err(RulesError::InconsistentSquad)?;

    let mut missing_players = Vec::new();
    let mut lookup = |player_id: &str| match points.points_for(player_id, gameweek) {
        Some(p) => p,
        None => {
            debug!("no points for player {} in gameweek {}, counting 0", player_id, gameweek);
            missing_players.push(player_id.to_string());
            0
        }
    };

    let captain_multiplier = if chips.is_active_for(ChipKind::TripleCaptain, gameweek) {
        TRIPLE_CAPTAIN_MULTIPLIER
    } else {
        CAPTAIN_MULTIPLIER
    };

    let mut starting_total = 0;
    for player in squad.starters() {
        let base = lookup(&player.player_id);
        starting_total += if player.player_id == squad.captain_id {
            base * captain_multiplier
        } else {
            base
        };
    }

    let bench_total: i32 = squad.bench().map(|p| lookup(&p.player_id)).sum();
    let bench_boost_applied = chips.is_active_for(ChipKind::BenchBoost, gameweek);

    let gross = starting_total + if bench_boost_applied { bench_total } else { 0 };
    let penalty = i32::try_from(points_deducted).unwrap_or(i32::MAX);
    let final_score = gross.saturating_sub(penalty);

    Ok(GameweekScore {
        gameweek,
        starting_total,
        bench_total,
        bench_boost_applied,
        captain_multiplier,
        transfer_penalty: points_deducted,
        final_score,
        missing_players,
    })
}
