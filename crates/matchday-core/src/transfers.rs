// Transfer engine: cost model, per-transfer application, and the wildcard /
// free hit transitions on the transfer record.

use tracing::debug;

use crate::error::{ensure_valid_gameweek, RulesError};
use crate::state::{
    FreeTransfers, Gameweek, GameweekTransferSummary, TransferState, POINTS_PER_EXTRA_TRANSFER,
};

/// Price a batch of `transfers_this_week` transfers without touching any state.
///
/// Used to preview the cost of a planned batch. Applying transfers must go
/// through `apply_transfer`, one call per swap.
pub fn calculate_transfer_cost(
    transfers_this_week: u32,
    saved_free_transfers: FreeTransfers,
    gameweek: Gameweek,
    wildcard_active: bool,
    free_hit_active: bool,
) -> GameweekTransferSummary {
    let all_free = GameweekTransferSummary {
        transfers_made: transfers_this_week,
        free_transfers_used: transfers_this_week,
        paid_transfers: 0,
        points_deducted: 0,
        wildcard_used: wildcard_active,
        free_hit_used: free_hit_active,
    };

    if wildcard_active || free_hit_active || gameweek == 1 {
        return all_free;
    }

    match saved_free_transfers {
        FreeTransfers::Unlimited => all_free,
        FreeTransfers::Limited(saved) => {
            let free_used = transfers_this_week.min(u32::from(saved));
            let paid = transfers_this_week - free_used;
            GameweekTransferSummary {
                free_transfers_used: free_used,
                paid_transfers: paid,
                points_deducted: paid * POINTS_PER_EXTRA_TRANSFER,
                ..all_free
            }
        }
    }
}

/// Apply a single transfer made during `gameweek`.
///
/// Call once per player swap. The returned summary covers the whole
/// gameweek so far, including this transfer.
pub fn apply_transfer(
    state: &TransferState,
    gameweek: Gameweek,
) -> Result<(TransferState, GameweekTransferSummary), RulesError> {
    ensure_valid_gameweek(gameweek)?;
    if gameweek < state.last_gameweek_processed {
        return Err(RulesError::InvalidTransition {
            requested: gameweek,
            last_processed: state.last_gameweek_processed,
        });
    }

    let mut next = state.clone();

    // Chip weeks are tracked for audit only: bank and penalty stay untouched.
    let free_week = state.chip_in_effect() || gameweek == 1;
    match state.saved_free_transfers {
        _ if free_week => {}
        FreeTransfers::Unlimited => {}
        FreeTransfers::Limited(0) => {
            next.points_deducted_this_week += POINTS_PER_EXTRA_TRANSFER;
            debug!(
                "paid transfer in gameweek {}: {} points deducted this week",
                gameweek, next.points_deducted_this_week
            );
        }
        FreeTransfers::Limited(saved) => {
            next.saved_free_transfers = FreeTransfers::Limited(saved - 1);
        }
    }

    next.transfers_made_this_week += 1;
    let summary = next.weekly_summary();
    Ok((next, summary))
}

/// Apply `count` transfers one at a time.
pub fn apply_transfers(
    state: &TransferState,
    gameweek: Gameweek,
    count: u32,
) -> Result<(TransferState, GameweekTransferSummary), RulesError> {
    let mut current = state.clone();
    let mut summary = current.weekly_summary();
    for _ in 0..count {
        let (next, next_summary) = apply_transfer(&current, gameweek)?;
        current = next;
        summary = next_summary;
    }
    Ok((current, summary))
}

/// Put the transfer record into wildcard mode.
///
/// Must be paired with activating the wildcard chip; `ManagerState::activate_chip`
/// does both.
pub fn activate_wildcard(state: &TransferState) -> TransferState {
    let mut next = state.clone();
    next.wildcard_active = true;
    next.saved_free_transfers = FreeTransfers::Unlimited;
    next.reset_weekly_counters();
    next
}

/// End a wildcard gameweek and move the record to `next_gameweek`, which
/// must come after the last processed gameweek.
///
/// A wildcard week always leaves exactly one free transfer, whatever was
/// banked before the wildcard was played.
pub fn deactivate_wildcard(
    state: &TransferState,
    next_gameweek: Gameweek,
) -> Result<TransferState, RulesError> {
    ensure_valid_gameweek(next_gameweek)?;
    if next_gameweek <= state.last_gameweek_processed {
        return Err(RulesError::InvalidTransition {
            requested: next_gameweek,
            last_processed: state.last_gameweek_processed,
        });
    }
    let mut next = state.clone();
    next.wildcard_active = false;
    next.saved_free_transfers = FreeTransfers::Limited(1);
    next.reset_weekly_counters();
    next.last_gameweek_processed = next_gameweek;
    Ok(next)
}

/// Put the transfer record into free hit mode.
///
/// The banked free transfers are left as they are; the next gameweek start
/// accrues on top of them as if the free hit week were a normal one.
pub fn activate_free_hit(state: &TransferState) -> TransferState {
    let mut next = state.clone();
    next.free_hit_active = true;
    next.reset_weekly_counters();
    next
}
