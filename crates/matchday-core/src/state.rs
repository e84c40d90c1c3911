// Per-manager transfer state: the free-transfer bank, weekly counters, and
// chip flags that the transfer engine and gameweek transitioner evolve.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A scoring round of the season, 1-indexed.
pub type Gameweek = u32;

/// Most free transfers a manager can bank.
pub const MAX_BANKED_FREE_TRANSFERS: u8 = 2;

/// Points charged for every transfer beyond the free allowance.
pub const POINTS_PER_EXTRA_TRANSFER: u32 = 4;

// ---------------------------------------------------------------------------
// FreeTransfers
// ---------------------------------------------------------------------------

/// Free transfers available to a manager for the current gameweek.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FreeTransfers {
    /// A banked count in `0..=MAX_BANKED_FREE_TRANSFERS`.
    Limited(u8),
    /// No transfer costs points this gameweek (GW1, first squad, wildcard).
    #[default]
    Unlimited,
}

impl FreeTransfers {
    /// A limited bank, capped at `MAX_BANKED_FREE_TRANSFERS`.
    pub fn limited(count: u32) -> Self {
        let capped = count.min(u32::from(MAX_BANKED_FREE_TRANSFERS));
        FreeTransfers::Limited(capped as u8)
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, FreeTransfers::Unlimited)
    }

    /// The banked count, or `None` when unlimited.
    pub fn count(&self) -> Option<u8> {
        match self {
            FreeTransfers::Limited(n) => Some(*n),
            FreeTransfers::Unlimited => None,
        }
    }
}

impl fmt::Display for FreeTransfers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreeTransfers::Limited(n) => write!(f, "{n}"),
            FreeTransfers::Unlimited => write!(f, "unlimited"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransferState
// ---------------------------------------------------------------------------

/// Long-lived transfer record for one manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferState {
    pub saved_free_transfers: FreeTransfers,
    pub transfers_made_this_week: u32,
    /// Always a multiple of `POINTS_PER_EXTRA_TRANSFER`.
    pub points_deducted_this_week: u32,
    pub wildcard_active: bool,
    pub free_hit_active: bool,
    /// Last gameweek whose weekly counters were reset. 0 before the season starts.
    pub last_gameweek_processed: Gameweek,
}

impl TransferState {
    /// State for a manager building their first squad in `joined_gameweek`.
    ///
    /// The first squad is always free to build, whatever the gameweek.
    pub fn new_manager(joined_gameweek: Gameweek) -> Self {
        TransferState {
            saved_free_transfers: FreeTransfers::Unlimited,
            last_gameweek_processed: joined_gameweek,
            ..Default::default()
        }
    }

    /// Whether transfers currently cost nothing regardless of the bank.
    pub fn chip_in_effect(&self) -> bool {
        self.wildcard_active || self.free_hit_active
    }

    /// Summary of this gameweek's transfers so far.
    pub fn weekly_summary(&self) -> GameweekTransferSummary {
        let paid = self.points_deducted_this_week / POINTS_PER_EXTRA_TRANSFER;
        GameweekTransferSummary {
            transfers_made: self.transfers_made_this_week,
            free_transfers_used: self.transfers_made_this_week.saturating_sub(paid),
            paid_transfers: paid,
            points_deducted: self.points_deducted_this_week,
            wildcard_used: self.wildcard_active,
            free_hit_used: self.free_hit_active,
        }
    }

    /// Check the structural invariants of the record.
    pub fn invariants_hold(&self) -> bool {
        let penalty_aligned = self.points_deducted_this_week % POINTS_PER_EXTRA_TRANSFER == 0;
        let free_week = self.chip_in_effect() || self.saved_free_transfers.is_unlimited();
        let no_penalty_in_free_week = !free_week || self.points_deducted_this_week == 0;
        let bank_in_range = self
            .saved_free_transfers
            .count()
            .map_or(true, |n| n <= MAX_BANKED_FREE_TRANSFERS);
        penalty_aligned && no_penalty_in_free_week && bank_in_range
    }

    pub(crate) fn reset_weekly_counters(&mut self) {
        self.transfers_made_this_week = 0;
        self.points_deducted_this_week = 0;
    }
}

// ---------------------------------------------------------------------------
// GameweekTransferSummary
// ---------------------------------------------------------------------------

/// Audit view of a manager's transfers in one gameweek.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameweekTransferSummary {
    pub transfers_made: u32,
    pub free_transfers_used: u32,
    pub paid_transfers: u32,
    pub points_deducted: u32,
    pub wildcard_used: bool,
    pub free_hit_used: bool,
}
