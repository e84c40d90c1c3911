// Gameweek transitions: free-transfer accrual and the idempotent weekly reset.

use tracing::debug;

use crate::error::{ensure_valid_gameweek, RulesError};
use crate::state::{FreeTransfers, Gameweek, TransferState};
use crate::transfers::deactivate_wildcard;

/// Free transfers available when moving from `from_gameweek` to `to_gameweek`.
///
/// One transfer accrues per elapsed gameweek, capped at the bank limit.
/// Gameweek 1 is unlimited, gameweek 2 always starts from exactly one, and an
/// unlimited grant never carries over into the next gameweek.
pub fn calculate_free_transfers(
    from_gameweek: Gameweek,
    to_gameweek: Gameweek,
    current: FreeTransfers,
) -> FreeTransfers {
    match (to_gameweek, current) {
        (1, _) => FreeTransfers::Unlimited,
        (2, _) => FreeTransfers::Limited(1),
        (_, FreeTransfers::Unlimited) => FreeTransfers::Limited(1),
        (_, FreeTransfers::Limited(banked)) => {
            let elapsed = to_gameweek.saturating_sub(from_gameweek);
            FreeTransfers::limited(u32::from(banked).saturating_add(elapsed))
        }
    }
}

/// Advance a manager's transfer record to the start of `gameweek`.
///
/// Calling this again for the same gameweek returns the state unchanged.
/// A gameweek older than the last processed one is a caller bug and is
/// rejected without producing a new state.
pub fn process_gameweek_start(
    state: &TransferState,
    gameweek: Gameweek,
) -> Result<TransferState, RulesError> {
    ensure_valid_gameweek(gameweek)?;

    let last = state.last_gameweek_processed;
    if gameweek < last {
        return Err(RulesError::InvalidTransition {
            requested: gameweek,
            last_processed: last,
        });
    }
    if gameweek == last {
        return Ok(state.clone());
    }

    if state.wildcard_active {
        debug!("wildcard expired entering gameweek {}", gameweek);
        let mut next = deactivate_wildcard(state, gameweek)?;
        next.free_hit_active = false;
        return Ok(next);
    }

    let saved = match state.saved_free_transfers {
        FreeTransfers::Unlimited if gameweek != 1 => FreeTransfers::Limited(1),
        current => calculate_free_transfers(last, gameweek, current),
    };

    let mut next = state.clone();
    next.saved_free_transfers = saved;
    next.reset_weekly_counters();
    next.wildcard_active = false;
    next.free_hit_active = false;
    next.last_gameweek_processed = gameweek;

    debug!(
        "gameweek {} -> {}: free transfers {} -> {}",
        last, gameweek, state.saved_free_transfers, saved
    );
    Ok(next)
}

/// Alias for `process_gameweek_start`, named for callers that think in
/// transitions rather than weekly resets.
pub fn transition_to_new_gameweek(
    state: &TransferState,
    gameweek: Gameweek,
) -> Result<TransferState, RulesError> {
    process_gameweek_start(state, gameweek)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfers::{activate_free_hit, activate_wildcard, apply_transfers};

    fn banked(saved: u8, last_processed: Gameweek) -> TransferState {
        TransferState {
            saved_free_transfers: FreeTransfers::Limited(saved),
            last_gameweek_processed: last_processed,
            ..Default::default()
        }
    }

    // --- calculate_free_transfers ---

    #[test]
    fn gameweek_one_is_unlimited() {
        assert_eq!(
            calculate_free_transfers(0, 1, FreeTransfers::Limited(0)),
            FreeTransfers::Unlimited
        );
    }

    #[test]
    fn gameweek_two_resets_to_one() {
        for current in [
            FreeTransfers::Limited(0),
            FreeTransfers::Limited(2),
            FreeTransfers::Unlimited,
        ] {
            assert_eq!(calculate_free_transfers(1, 2, current), FreeTransfers::Limited(1));
        }
    }

    #[test]
    fn accrual_is_capped_at_two_and_never_negative() {
        for banked in 0..=2u8 {
            for from in 2..10u32 {
                for to in from..from + 6 {
                    let result = calculate_free_transfers(from, to, FreeTransfers::Limited(banked));
                    let count = result.count().expect("limited input stays limited");
                    assert!(count <= 2, "from={from} to={to} banked={banked}");
                }
            }
        }
    }

    #[test]
    fn one_transfer_accrues_per_elapsed_gameweek() {
        assert_eq!(
            calculate_free_transfers(5, 6, FreeTransfers::Limited(0)),
            FreeTransfers::Limited(1)
        );
        assert_eq!(
            calculate_free_transfers(5, 6, FreeTransfers::Limited(1)),
            FreeTransfers::Limited(2)
        );
        assert_eq!(
            calculate_free_transfers(5, 6, FreeTransfers::Limited(2)),
            FreeTransfers::Limited(2)
        );
    }

    // --- process_gameweek_start ---

    #[test]
    fn multi_week_gap_accrues_up_to_cap() {
        let next = process_gameweek_start(&banked(1, 3), 6).unwrap();
        assert_eq!(next.saved_free_transfers, FreeTransfers::Limited(2));
        assert_eq!(next.last_gameweek_processed, 6);
    }

    #[test]
    fn processing_is_idempotent() {
        let (spent, _) = apply_transfers(&banked(1, 4), 4, 3).unwrap();
        let once = process_gameweek_start(&spent, 5).unwrap();
        let twice = process_gameweek_start(&once, 5).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.transfers_made_this_week, 0);
        assert_eq!(once.points_deducted_this_week, 0);
        assert_eq!(once.saved_free_transfers, FreeTransfers::Limited(1));
    }

    #[test]
    fn same_gameweek_does_not_reset_counters() {
        let (spent, _) = apply_transfers(&banked(0, 4), 4, 2).unwrap();
        let again = process_gameweek_start(&spent, 4).unwrap();
        assert_eq!(again.points_deducted_this_week, 8);
        assert_eq!(again.transfers_made_this_week, 2);
    }

    #[test]
    fn older_gameweek_is_rejected() {
        let err = process_gameweek_start(&banked(1, 9), 8).unwrap_err();
        assert_eq!(
            err,
            RulesError::InvalidTransition {
                requested: 8,
                last_processed: 9
            }
        );
    }

    #[test]
    fn gameweek_zero_is_a_defect() {
        assert_eq!(
            process_gameweek_start(&TransferState::default(), 0).unwrap_err(),
            RulesError::InvalidGameweek(0)
        );
    }

    #[test]
    fn season_start_keeps_unlimited_for_gameweek_one() {
        let gw1 = process_gameweek_start(&TransferState::default(), 1).unwrap();
        assert!(gw1.saved_free_transfers.is_unlimited());
        let gw2 = process_gameweek_start(&gw1, 2).unwrap();
        assert_eq!(gw2.saved_free_transfers, FreeTransfers::Limited(1));
    }

    #[test]
    fn unlimited_grant_is_not_inherited() {
        let late_joiner = TransferState::new_manager(10);
        let next = process_gameweek_start(&late_joiner, 13).unwrap();
        assert_eq!(next.saved_free_transfers, FreeTransfers::Limited(1));
    }

    #[test]
    fn wildcard_week_yields_exactly_one_free_transfer() {
        let wildcard = activate_wildcard(&banked(2, 8));
        // Gap of three gameweeks would normally accrue to the cap.
        let next = process_gameweek_start(&wildcard, 11).unwrap();
        assert_eq!(next.saved_free_transfers, FreeTransfers::Limited(1));
        assert!(!next.wildcard_active);
        assert_eq!(next.last_gameweek_processed, 11);
    }

    #[test]
    fn free_hit_week_accrues_on_the_untouched_bank() {
        let free_hit = activate_free_hit(&banked(1, 7));
        let (used, _) = apply_transfers(&free_hit, 7, 6).unwrap();
        let next = process_gameweek_start(&used, 8).unwrap();
        assert!(!next.free_hit_active);
        assert_eq!(next.saved_free_transfers, FreeTransfers::Limited(2));
        assert_eq!(next.transfers_made_this_week, 0);
    }

    #[test]
    fn transition_alias_matches() {
        let state = banked(0, 5);
        assert_eq!(
            transition_to_new_gameweek(&state, 6).unwrap(),
            process_gameweek_start(&state, 6).unwrap()
        );
    }
}
