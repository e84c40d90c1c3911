// Rejections produced by the rules engine.
//
// Paying points for an extra transfer is not an error; it is the normal
// outcome of `apply_transfer` with an empty bank. These variants cover the
// cases where the engine refuses to produce a new state at all.

use std::fmt;

use thiserror::Error;

use crate::chips::ChipKind;
use crate::state::Gameweek;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("gameweek {requested} is older than the last processed gameweek {last_processed}")]
    InvalidTransition {
        requested: Gameweek,
        last_processed: Gameweek,
    },

    #[error("cannot activate {chip}: {reason}")]
    IneligibleChipActivation {
        chip: ChipKind,
        reason: IneligibleReason,
    },

    #[error("inconsistent squad: {0}")]
    InconsistentSquad(SquadProblem),

    /// A gameweek number of 0 reached the engine. Always a caller bug.
    #[error("gameweek must be a positive integer, got {0}")]
    InvalidGameweek(Gameweek),
}

/// Why a chip could not be activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    AlreadyUsed,
    OutsideWindow { first: Gameweek, last: Gameweek },
    AnotherChipActive(ChipKind),
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::AlreadyUsed => write!(f, "chip already used this season"),
            IneligibleReason::OutsideWindow { first, last } => {
                write!(f, "only available from gameweek {first} to {last}")
            }
            IneligibleReason::AnotherChipActive(other) => {
                write!(f, "{other} is already active this gameweek")
            }
        }
    }
}

/// What is wrong with a squad handed to the points aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquadProblem {
    WrongStarterCount(usize),
    TooManyPlayers(usize),
    DuplicatePlayer(String),
    CaptainNotStarting(String),
}

impl fmt::Display for SquadProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquadProblem::WrongStarterCount(n) => write!(f, "expected 11 starters, found {n}"),
            SquadProblem::TooManyPlayers(n) => write!(f, "squad has {n} players, maximum is 15"),
            SquadProblem::DuplicatePlayer(id) => write!(f, "player {id} appears more than once"),
            SquadProblem::CaptainNotStarting(id) => {
                write!(f, "captain {id} is not in the starting XI")
            }
        }
    }
}

/// Reject gameweek 0 before any rule runs.
pub(crate) fn ensure_valid_gameweek(gameweek: Gameweek) -> Result<(), RulesError> {
    if gameweek == 0 {
        return Err(RulesError::InvalidGameweek(gameweek));
    }
    Ok(())
}
