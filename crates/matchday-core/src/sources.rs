// Collaborators the rules engine is used with but never calls on its own.
//
// The host application implements these (the `matchday-app` crate does so on
// top of SQLite and a configured deadline schedule) and wraps each engine
// call in a per-manager read-modify-write.

use std::collections::HashMap;

use crate::manager::ManagerState;
use crate::points::Squad;
use crate::state::Gameweek;

/// Tells the caller when transfers for a gameweek are allowed.
pub trait GameweekWindowOracle {
    fn is_gameweek_open(&self, gameweek: Gameweek) -> bool;
    fn current_open_gameweek(&self) -> Option<Gameweek>;
}

/// Per-player points for a gameweek, already converted from raw stats.
pub trait PlayerPointsSource {
    /// `None` when no points are recorded; the aggregator counts it as 0.
    fn points_for(&self, player_id: &str, gameweek: Gameweek) -> Option<i32>;
}

/// Loads and saves the `(TransferState, ChipsUsed)` pair of a manager.
///
/// Implementations must make a load followed by a save for the same manager
/// atomic; transfers and gameweek starts do not commute.
pub trait StateStore {
    type Error;

    fn load(&self, user_id: &str) -> Result<Option<ManagerState>, Self::Error>;
    fn save(&self, user_id: &str, state: &ManagerState) -> Result<(), Self::Error>;
}

/// The squad a manager saved for a gameweek.
pub trait SquadSource {
    type Error;

    fn squad_for(&self, user_id: &str, gameweek: Gameweek) -> Result<Option<Squad>, Self::Error>;
}

/// Points for a single gameweek keyed by player id.
impl PlayerPointsSource for HashMap<String, i32> {
    fn points_for(&self, player_id: &str, _gameweek: Gameweek) -> Option<i32> {
        self.get(player_id).copied()
    }
}

/// Points for any gameweek keyed by `(player id, gameweek)`.
impl PlayerPointsSource for HashMap<(String, Gameweek), i32> {
    fn points_for(&self, player_id: &str, gameweek: Gameweek) -> Option<i32> {
        self.get(&(player_id.to_string(), gameweek)).copied()
    }
}
