// Season orchestration: applies manager actions through the rules engine
// inside per-manager store transactions, and rolls the whole league into a
// new gameweek.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use matchday_core::sources::{GameweekWindowOracle, SquadSource, StateStore};
use matchday_core::{
    ChipKind, Gameweek, GameweekScore, GameweekTransferSummary, ManagerState, RulesError, Squad,
};

use crate::db::{ClosedGameweek, Database};

// ---------------------------------------------------------------------------
// Error and report types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error("unknown manager: {0}")]
    UnknownManager(String),

    #[error("gameweek {0} is not open for changes")]
    GameweekClosed(Gameweek),

    #[error("no squad saved for {user_id} in gameweek {gameweek}")]
    MissingSquad { user_id: String, gameweek: Gameweek },

    #[error("no result recorded for {user_id} in gameweek {gameweek}")]
    NoResult { user_id: String, gameweek: Gameweek },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Outcome of rolling every manager into a new gameweek.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloverReport {
    pub gameweek: Gameweek,
    /// Managers moved into the gameweek by this run.
    pub started: usize,
    /// Managers already in the gameweek (a repeated run).
    pub unchanged: usize,
    /// Outgoing gameweeks scored and recorded on the way.
    pub scored: usize,
    /// Managers that could not be rolled over, with the reason.
    pub failed: Vec<(String, String)>,
}

/// The outgoing gameweek of one manager, ready to score.
struct Closing {
    gameweek: Gameweek,
    squad: Squad,
}

// ---------------------------------------------------------------------------
// SeasonService
// ---------------------------------------------------------------------------

pub struct SeasonService<O> {
    db: Database,
    oracle: O,
}

impl<O: GameweekWindowOracle> SeasonService<O> {
    pub fn new(db: Database, oracle: O) -> Self {
        SeasonService { db, oracle }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    fn ensure_open(&self, gameweek: Gameweek) -> Result<(), ServiceError> {
        if self.oracle.is_gameweek_open(gameweek) {
            Ok(())
        } else {
            Err(ServiceError::GameweekClosed(gameweek))
        }
    }

    /// Register a manager joining in `joined_gameweek`. Returns `false` if
    /// the manager already exists, in which case nothing changes.
    pub fn register_manager(
        &self,
        user_id: &str,
        joined_gameweek: Gameweek,
    ) -> Result<bool, ServiceError> {
        if joined_gameweek == 0 {
            return Err(RulesError::InvalidGameweek(joined_gameweek).into());
        }
        let created = self
            .db
            .update_manager(user_id, |current| -> Result<_, ServiceError> {
                Ok(match current {
                    Some(existing) => (existing, false),
                    None => (ManagerState::new(joined_gameweek), true),
                })
            })?;
        if created {
            info!("Registered manager {} in gameweek {}", user_id, joined_gameweek);
        }
        Ok(created)
    }

    pub fn manager(&self, user_id: &str) -> Result<ManagerState, ServiceError> {
        self.db
            .load(user_id)?
            .ok_or_else(|| ServiceError::UnknownManager(user_id.to_string()))
    }

    /// Save the squad a manager picked for an open gameweek.
    pub fn save_squad(
        &self,
        user_id: &str,
        gameweek: Gameweek,
        squad: &Squad,
    ) -> Result<(), ServiceError> {
        self.ensure_open(gameweek)?;
        squad.validate().map_err(RulesError::InconsistentSquad)?;
        self.manager(user_id)?;
        self.db.save_squad(user_id, gameweek, squad)?;
        Ok(())
    }

    /// Record `count` transfers for a manager in an open gameweek.
    ///
    /// A manager whose record still sits in an earlier gameweek is rolled
    /// forward first, and the gameweek left behind is scored on the way.
    pub fn make_transfers(
        &self,
        user_id: &str,
        gameweek: Gameweek,
        count: u32,
    ) -> Result<GameweekTransferSummary, ServiceError> {
        self.ensure_open(gameweek)?;
        let (closing, points) = self.closing_with_points(user_id, gameweek)?;
        let (summary, closed) = self
            .db
            .advance_manager(user_id, |current| -> Result<_, ServiceError> {
                let state =
                    current.ok_or_else(|| ServiceError::UnknownManager(user_id.to_string()))?;
                let (state, closed) = roll_forward(state, closing.as_ref(), &points, gameweek)?;
                let closed_gameweek = closed.as_ref().map(|c| c.score.gameweek);
                let (next, summary) = state.apply_transfers(gameweek, count)?;
                Ok((next, closed, (summary, closed_gameweek)))
            })?;
        log_caught_up(user_id, closed);
        debug!(
            "{} made {} transfer(s) in gameweek {}: {} paid, {} points",
            user_id, count, gameweek, summary.paid_transfers, summary.points_deducted
        );
        Ok(summary)
    }

    /// What `additional` more transfers would cost a manager this gameweek.
    pub fn preview_transfers(
        &self,
        user_id: &str,
        gameweek: Gameweek,
        additional: u32,
    ) -> Result<GameweekTransferSummary, ServiceError> {
        let (state, _) = roll_forward(self.manager(user_id)?, None, &HashMap::new(), gameweek)?;
        Ok(state.preview_transfers(gameweek, additional))
    }

    /// Play a chip for a manager in an open gameweek. A lagging manager is
    /// rolled forward first, as for transfers.
    pub fn activate_chip(
        &self,
        user_id: &str,
        kind: ChipKind,
        gameweek: Gameweek,
    ) -> Result<ManagerState, ServiceError> {
        self.ensure_open(gameweek)?;
        let (closing, points) = self.closing_with_points(user_id, gameweek)?;
        let (state, closed) = self
            .db
            .advance_manager(user_id, |current| -> Result<_, ServiceError> {
                let state =
                    current.ok_or_else(|| ServiceError::UnknownManager(user_id.to_string()))?;
                let (state, closed) = roll_forward(state, closing.as_ref(), &points, gameweek)?;
                let closed_gameweek = closed.as_ref().map(|c| c.score.gameweek);
                let next = state.activate_chip(kind, gameweek)?;
                Ok((next.clone(), closed, (next, closed_gameweek)))
            })?;
        log_caught_up(user_id, closed);
        info!("{} played {} in gameweek {}", user_id, kind, gameweek);
        Ok(state)
    }

    /// Roll every manager into `gameweek`.
    ///
    /// Each manager's outgoing gameweek is scored and recorded first (when a
    /// squad was saved for it), then the transfer bank and chips move on. A
    /// failure for one manager is reported and does not stop the others.
    pub fn start_gameweek(&self, gameweek: Gameweek) -> Result<RolloverReport, ServiceError> {
        if gameweek == 0 {
            return Err(RulesError::InvalidGameweek(gameweek).into());
        }
        let mut report = RolloverReport {
            gameweek,
            ..Default::default()
        };
        let mut points_cache: HashMap<Gameweek, HashMap<String, i32>> = HashMap::new();

        for user_id in self.db.list_managers()? {
            match self.roll_manager(&user_id, gameweek, &mut points_cache) {
                Ok(RollOutcome::Unchanged) => report.unchanged += 1,
                Ok(RollOutcome::Started { scored }) => {
                    report.started += 1;
                    if scored {
                        report.scored += 1;
                    }
                }
                Err(e) => {
                    warn!("Could not start gameweek {} for {}: {}", gameweek, user_id, e);
                    report.failed.push((user_id, e.to_string()));
                }
            }
        }

        info!(
            "Gameweek {} started: {} moved, {} unchanged, {} scored, {} failed",
            gameweek,
            report.started,
            report.unchanged,
            report.scored,
            report.failed.len()
        );
        Ok(report)
    }

    fn roll_manager(
        &self,
        user_id: &str,
        gameweek: Gameweek,
        points_cache: &mut HashMap<Gameweek, HashMap<String, i32>>,
    ) -> Result<RollOutcome, ServiceError> {
        let closing = self.closing_gameweek(user_id, gameweek)?;
        let no_points = HashMap::new();
        let points = match &closing {
            Some(c) => self.cached_points(c.gameweek, points_cache)?,
            None => &no_points,
        };

        self.db
            .advance_manager(user_id, |current| -> Result<_, ServiceError> {
                let state =
                    current.ok_or_else(|| ServiceError::UnknownManager(user_id.to_string()))?;
                if state.current_gameweek() == gameweek {
                    return Ok((state, None, RollOutcome::Unchanged));
                }
                let (next, closed) = roll_forward(state, closing.as_ref(), points, gameweek)?;
                let scored = closed.is_some();
                Ok((next, closed, RollOutcome::Started { scored }))
            })
    }

    /// The gameweek a manager is leaving, if a squad was saved for it.
    ///
    /// A result recorded earlier in that gameweek is a live score and is
    /// replaced by the final one.
    fn closing_gameweek(
        &self,
        user_id: &str,
        gameweek: Gameweek,
    ) -> Result<Option<Closing>, ServiceError> {
        let state = self.manager(user_id)?;
        let outgoing = state.current_gameweek();
        if outgoing == 0 || outgoing >= gameweek {
            return Ok(None);
        }
        Ok(self
            .db
            .squad_for(user_id, outgoing)?
            .map(|squad| Closing {
                gameweek: outgoing,
                squad,
            }))
    }

    /// The closing gameweek for a catch-up, with the points to score it.
    fn closing_with_points(
        &self,
        user_id: &str,
        gameweek: Gameweek,
    ) -> Result<(Option<Closing>, HashMap<String, i32>), ServiceError> {
        let closing = self.closing_gameweek(user_id, gameweek)?;
        let points = match &closing {
            Some(c) => self.db.points_for_gameweek(c.gameweek)?,
            None => HashMap::new(),
        };
        Ok((closing, points))
    }

    fn cached_points<'a>(
        &self,
        gameweek: Gameweek,
        cache: &'a mut HashMap<Gameweek, HashMap<String, i32>>,
    ) -> Result<&'a HashMap<String, i32>, ServiceError> {
        let points = match cache.entry(gameweek) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.db.points_for_gameweek(gameweek)?),
        };
        Ok(points)
    }

    /// Score a manager for `gameweek`.
    ///
    /// The gameweek in progress is scored live from the saved squad and the
    /// imported points and the result is recorded. Earlier gameweeks return
    /// the result recorded when they closed.
    pub fn score_manager(
        &self,
        user_id: &str,
        gameweek: Gameweek,
    ) -> Result<GameweekScore, ServiceError> {
        if gameweek == 0 {
            return Err(RulesError::InvalidGameweek(gameweek).into());
        }
        let state = self.manager(user_id)?;
        if gameweek < state.current_gameweek() {
            return self
                .db
                .load_result(user_id, gameweek)?
                .map(|result| result.score)
                .ok_or_else(|| ServiceError::NoResult {
                    user_id: user_id.to_string(),
                    gameweek,
                });
        }

        let squad = self
            .db
            .squad_for(user_id, gameweek)?
            .ok_or_else(|| ServiceError::MissingSquad {
                user_id: user_id.to_string(),
                gameweek,
            })?;
        let points = self.db.points_for_gameweek(gameweek)?;
        let score = state.score(&squad, &points, gameweek)?;
        if !score.missing_players.is_empty() {
            debug!(
                "{} players without points for {} in gameweek {}",
                score.missing_players.len(),
                user_id,
                gameweek
            );
        }
        self.db.record_result(
            user_id,
            gameweek,
            &state.transfer_state.weekly_summary(),
            &score,
        )?;
        Ok(score)
    }

    /// Score every manager who saved a squad for `gameweek`.
    ///
    /// Managers without a squad (or a recorded result, for a closed
    /// gameweek) are skipped; other failures are logged and skipped.
    pub fn score_gameweek(
        &self,
        gameweek: Gameweek,
    ) -> Result<Vec<(String, GameweekScore)>, ServiceError> {
        let mut scores = Vec::new();
        for user_id in self.db.list_managers()? {
            match self.score_manager(&user_id, gameweek) {
                Ok(score) => scores.push((user_id, score)),
                Err(ServiceError::MissingSquad { .. } | ServiceError::NoResult { .. }) => {
                    debug!("{} has nothing to score in gameweek {}", user_id, gameweek);
                }
                Err(e) => warn!("Could not score {} in gameweek {}: {}", user_id, gameweek, e),
            }
        }
        Ok(scores)
    }
}

enum RollOutcome {
    Unchanged,
    Started { scored: bool },
}

/// Move `state` into `gameweek` unless it is already there.
///
/// When `closing` holds the squad of the gameweek being left, that gameweek
/// is scored with the state as it stood before the move.
fn roll_forward(
    state: ManagerState,
    closing: Option<&Closing>,
    points: &HashMap<String, i32>,
    gameweek: Gameweek,
) -> Result<(ManagerState, Option<ClosedGameweek>), ServiceError> {
    if state.current_gameweek() == gameweek {
        return Ok((state, None));
    }
    let closed = match closing {
        Some(c) if c.gameweek == state.current_gameweek() => Some(ClosedGameweek {
            summary: state.transfer_state.weekly_summary(),
            score: state.score(&c.squad, points, c.gameweek)?,
        }),
        _ => None,
    };
    Ok((state.start_gameweek(gameweek)?, closed))
}

fn log_caught_up(user_id: &str, closed: Option<Gameweek>) {
    if let Some(gameweek) = closed {
        info!("Recorded gameweek {} for {} while catching up", gameweek, user_id);
    }
}
