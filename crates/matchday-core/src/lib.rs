// Library root: transfer budget, chip lifecycle, and gameweek scoring rules.
//
// Everything in this crate is a pure transform over values. Loading and
// saving manager state, fetching player points, and deciding when a
// gameweek opens all happen in the caller, through the traits in `sources`.

pub mod chips;
pub mod error;
pub mod gameweek;
pub mod manager;
pub mod points;
pub mod sources;
pub mod state;
pub mod transfers;

pub use chips::{ChipKind, ChipUsage, ChipsUsed};
pub use error::{IneligibleReason, RulesError, SquadProblem};
pub use gameweek::{calculate_free_transfers, process_gameweek_start, transition_to_new_gameweek};
pub use manager::ManagerState;
pub use points::{score_gameweek, GameweekScore, Squad, SquadPlayer};
pub use state::{FreeTransfers, Gameweek, GameweekTransferSummary, TransferState};
pub use transfers::{
    activate_free_hit, activate_wildcard, apply_transfer, apply_transfers,
    calculate_transfer_cost, deactivate_wildcard,
};
