// The per-manager unit of state: transfer record and chip registry, evolved
// together so a chip and its transfer-side flag can never disagree.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chips::{ChipKind, ChipsUsed};
use crate::error::{ensure_valid_gameweek, RulesError};
use crate::gameweek::process_gameweek_start;
use crate::points::{score_gameweek, GameweekScore, Squad};
use crate::sources::PlayerPointsSource;
use crate::state::{Gameweek, GameweekTransferSummary, TransferState};
use crate::transfers::{
    activate_free_hit, activate_wildcard, apply_transfer, apply_transfers,
    calculate_transfer_cost, deactivate_wildcard,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerState {
    pub transfer_state: TransferState,
    pub chips_used: ChipsUsed,
}

impl ManagerState {
    /// A manager who joins the game in `joined_gameweek` with all chips unplayed.
    pub fn new(joined_gameweek: Gameweek) -> Self {
        ManagerState {
            transfer_state: TransferState::new_manager(joined_gameweek),
            chips_used: ChipsUsed::default(),
        }
    }

    /// The gameweek the weekly counters currently belong to.
    pub fn current_gameweek(&self) -> Gameweek {
        self.transfer_state.last_gameweek_processed
    }

    /// Roll the manager into `gameweek`: accrue transfers, reset weekly
    /// counters, and expire chips played in earlier gameweeks.
    pub fn start_gameweek(&self, gameweek: Gameweek) -> Result<ManagerState, RulesError> {
        let transfer_state = process_gameweek_start(&self.transfer_state, gameweek)?;
        Ok(ManagerState {
            transfer_state,
            chips_used: self.chips_used.expire_before(gameweek),
        })
    }

    /// Play `kind` in `gameweek` and switch the transfer record into the
    /// matching mode.
    pub fn activate_chip(
        &self,
        kind: ChipKind,
        gameweek: Gameweek,
    ) -> Result<ManagerState, RulesError> {
        self.ensure_current(gameweek)?;
        let chips_used = self.chips_used.activate(kind, gameweek)?;
        let transfer_state = match kind {
            ChipKind::Wildcard1 | ChipKind::Wildcard2 => activate_wildcard(&self.transfer_state),
            ChipKind::FreeHit => activate_free_hit(&self.transfer_state),
            ChipKind::BenchBoost | ChipKind::TripleCaptain => self.transfer_state.clone(),
        };
        debug!(
            "{} played in gameweek {} (free transfers now {})",
            kind, gameweek, transfer_state.saved_free_transfers
        );
        Ok(ManagerState {
            transfer_state,
            chips_used,
        })
    }

    /// Take `kind` out of effect ahead of the normal gameweek-start expiry.
    ///
    /// Ending a wildcard moves the record to `next_gameweek` with exactly one
    /// free transfer. Ending a free hit leaves the bank alone. A chip that is
    /// not in effect is left as it is.
    pub fn deactivate_chip(
        &self,
        kind: ChipKind,
        next_gameweek: Gameweek,
    ) -> Result<ManagerState, RulesError> {
        ensure_valid_gameweek(next_gameweek)?;
        let current = self.current_gameweek();
        if next_gameweek <= current {
            return Err(RulesError::InvalidTransition {
                requested: next_gameweek,
                last_processed: current,
            });
        }
        if !self.chips_used.get(kind).is_active {
            return Ok(self.clone());
        }

        let transfer_state = match kind {
            ChipKind::Wildcard1 | ChipKind::Wildcard2 => {
                deactivate_wildcard(&self.transfer_state, next_gameweek)?
            }
            ChipKind::FreeHit => TransferState {
                free_hit_active: false,
                ..self.transfer_state.clone()
            },
            ChipKind::BenchBoost | ChipKind::TripleCaptain => self.transfer_state.clone(),
        };
        Ok(ManagerState {
            transfer_state,
            chips_used: self.chips_used.deactivate(kind),
        })
    }

    /// Apply one transfer in `gameweek`, which must be the current one.
    pub fn apply_transfer(
        &self,
        gameweek: Gameweek,
    ) -> Result<(ManagerState, GameweekTransferSummary), RulesError> {
        self.ensure_current(gameweek)?;
        let (transfer_state, summary) = apply_transfer(&self.transfer_state, gameweek)?;
        Ok((self.with_transfer_state(transfer_state), summary))
    }

    /// Apply `count` transfers in `gameweek`, one at a time.
    pub fn apply_transfers(
        &self,
        gameweek: Gameweek,
        count: u32,
    ) -> Result<(ManagerState, GameweekTransferSummary), RulesError> {
        self.ensure_current(gameweek)?;
        let (transfer_state, summary) = apply_transfers(&self.transfer_state, gameweek, count)?;
        Ok((self.with_transfer_state(transfer_state), summary))
    }

    /// What making `additional` more transfers this gameweek would cost in total.
    pub fn preview_transfers(&self, gameweek: Gameweek, additional: u32) -> GameweekTransferSummary {
        let state = &self.transfer_state;
        let banked_summary = calculate_transfer_cost(
            additional,
            state.saved_free_transfers,
            gameweek,
            state.wildcard_active,
            state.free_hit_active,
        );
        let so_far = state.weekly_summary();
        GameweekTransferSummary {
            transfers_made: so_far.transfers_made + banked_summary.transfers_made,
            free_transfers_used: so_far.free_transfers_used + banked_summary.free_transfers_used,
            paid_transfers: so_far.paid_transfers + banked_summary.paid_transfers,
            points_deducted: so_far.points_deducted + banked_summary.points_deducted,
            ..banked_summary
        }
    }

    /// Score the gameweek in progress with this manager's chips and penalty.
    pub fn score<P>(
        &self,
        squad: &Squad,
        points: &P,
        gameweek: Gameweek,
    ) -> Result<GameweekScore, RulesError>
    where
        P: PlayerPointsSource + ?Sized,
    {
        self.ensure_current(gameweek)?;
        score_gameweek(
            squad,
            points,
            &self.chips_used,
            gameweek,
            self.transfer_state.points_deducted_this_week,
        )
    }

    fn ensure_current(&self, gameweek: Gameweek) -> Result<(), RulesError> {
        ensure_valid_gameweek(gameweek)?;
        let current = self.current_gameweek();
        if gameweek != current {
            return Err(RulesError::InvalidTransition {
                requested: gameweek,
                last_processed: current,
            });
        }
        Ok(())
    }

    fn with_transfer_state(&self, transfer_state: TransferState) -> ManagerState {
        ManagerState {
            transfer_state,
            chips_used: self.chips_used.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IneligibleReason;
    use crate::state::FreeTransfers;
    use std::collections::HashMap;

    fn at_gameweek(gameweek: Gameweek, banked: u8) -> ManagerState {
        ManagerState {
            transfer_state: TransferState {
                saved_free_transfers: FreeTransfers::Limited(banked),
                last_gameweek_processed: gameweek,
                ..Default::default()
            },
            chips_used: ChipsUsed::default(),
        }
    }

    #[test]
    fn wildcard_chip_switches_transfer_record() {
        let state = at_gameweek(5, 2).activate_chip(ChipKind::Wildcard1, 5).unwrap();
        assert!(state.transfer_state.wildcard_active);
        assert!(state.transfer_state.saved_free_transfers.is_unlimited());
        assert!(state.chips_used.is_active_for(ChipKind::Wildcard1, 5));
    }

    #[test]
    fn free_hit_chip_keeps_bank() {
        let state = at_gameweek(5, 2).activate_chip(ChipKind::FreeHit, 5).unwrap();
        assert!(state.transfer_state.free_hit_active);
        assert_eq!(state.transfer_state.saved_free_transfers, FreeTransfers::Limited(2));
    }

    #[test]
    fn scoring_chips_leave_transfer_record_alone() {
        let before = at_gameweek(5, 1);
        let after = before.activate_chip(ChipKind::BenchBoost, 5).unwrap();
        assert_eq!(after.transfer_state, before.transfer_state);
    }

    #[test]
    fn rejected_chip_leaves_state_alone() {
        let state = at_gameweek(5, 1).activate_chip(ChipKind::TripleCaptain, 5).unwrap();
        let err = state.activate_chip(ChipKind::Wildcard1, 5).unwrap_err();
        assert_eq!(
            err,
            RulesError::IneligibleChipActivation {
                chip: ChipKind::Wildcard1,
                reason: IneligibleReason::AnotherChipActive(ChipKind::TripleCaptain),
            }
        );
        assert!(!state.transfer_state.wildcard_active);
    }

    #[test]
    fn chip_for_a_gameweek_not_yet_started_is_rejected() {
        let err = at_gameweek(5, 1).activate_chip(ChipKind::BenchBoost, 6).unwrap_err();
        assert!(matches!(err, RulesError::InvalidTransition { requested: 6, .. }));
    }

    #[test]
    fn start_gameweek_expires_chips_and_unblocks_others() {
        let played = at_gameweek(5, 1).activate_chip(ChipKind::Wildcard1, 5).unwrap();
        let next = played.start_gameweek(6).unwrap();
        assert!(next.chips_used.active_chip(6).is_none());
        assert!(next.chips_used.get(ChipKind::Wildcard1).used);
        assert!(next.chips_used.can_activate(ChipKind::BenchBoost, 6));
        assert_eq!(next.transfer_state.saved_free_transfers, FreeTransfers::Limited(1));
    }

    #[test]
    fn deactivating_wildcard_forces_one_transfer() {
        let played = at_gameweek(5, 2).activate_chip(ChipKind::Wildcard1, 5).unwrap();
        let ended = played.deactivate_chip(ChipKind::Wildcard1, 6).unwrap();
        assert!(!ended.transfer_state.wildcard_active);
        assert_eq!(ended.transfer_state.saved_free_transfers, FreeTransfers::Limited(1));
        assert_eq!(ended.current_gameweek(), 6);
        assert!(ended.chips_used.get(ChipKind::Wildcard1).used);
    }

    #[test]
    fn deactivating_free_hit_keeps_bank() {
        let played = at_gameweek(5, 2).activate_chip(ChipKind::FreeHit, 5).unwrap();
        let ended = played.deactivate_chip(ChipKind::FreeHit, 6).unwrap();
        assert!(!ended.transfer_state.free_hit_active);
        assert_eq!(ended.transfer_state.saved_free_transfers, FreeTransfers::Limited(2));
        assert_eq!(ended.current_gameweek(), 5);
    }

    #[test]
    fn deactivating_chip_into_processed_gameweek_is_rejected() {
        let played = at_gameweek(8, 1).activate_chip(ChipKind::Wildcard1, 8).unwrap();
        let (played, _) = played.apply_transfers(8, 3).unwrap();

        for next_gameweek in [3, 8] {
            let err = played
                .deactivate_chip(ChipKind::Wildcard1, next_gameweek)
                .unwrap_err();
            assert_eq!(
                err,
                RulesError::InvalidTransition {
                    requested: next_gameweek,
                    last_processed: 8,
                }
            );
        }
        assert_eq!(played.transfer_state.transfers_made_this_week, 3);
        assert!(played.start_gameweek(4).is_err());
    }

    #[test]
    fn deactivating_the_other_wildcard_changes_nothing() {
        let played = at_gameweek(5, 1).activate_chip(ChipKind::Wildcard1, 5).unwrap();
        let after = played.deactivate_chip(ChipKind::Wildcard2, 6).unwrap();
        assert_eq!(after, played);
        assert!(after.chips_used.is_active_for(ChipKind::Wildcard1, 5));
        assert!(after.transfer_state.wildcard_active);
    }

    #[test]
    fn deactivating_free_hit_that_is_not_active_keeps_wildcard() {
        let played = at_gameweek(5, 1).activate_chip(ChipKind::Wildcard1, 5).unwrap();
        let after = played.deactivate_chip(ChipKind::FreeHit, 6).unwrap();
        assert_eq!(after, played);
    }

    #[test]
    fn transfers_for_another_gameweek_are_rejected() {
        let (state, _) = at_gameweek(5, 0).apply_transfer(5).unwrap();
        let attempts = [
            state.apply_transfer(6),
            state.apply_transfers(6, 1),
            state.apply_transfer(4),
        ];
        for result in attempts {
            assert!(matches!(
                result.unwrap_err(),
                RulesError::InvalidTransition { last_processed: 5, .. }
            ));
        }
        assert_eq!(state.transfer_state.transfers_made_this_week, 1);
        assert_eq!(state.transfer_state.points_deducted_this_week, 4);
    }

    #[test]
    fn preview_includes_transfers_already_made() {
        let (state, _) = at_gameweek(9, 1).apply_transfer(9).unwrap();
        let preview = state.preview_transfers(9, 2);
        assert_eq!(preview.transfers_made, 3);
        assert_eq!(preview.paid_transfers, 2);
        assert_eq!(preview.points_deducted, 8);
    }

    #[test]
    fn score_uses_weekly_penalty() {
        let (state, _) = at_gameweek(9, 0).apply_transfers(9, 2).unwrap();
        let starters = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"];
        let squad = Squad::new(&starters, &["x"], "a");
        let points: HashMap<String, i32> =
            starters.iter().map(|id| (id.to_string(), 3)).collect();
        let score = state.score(&squad, &points, 9).unwrap();
        assert_eq!(score.starting_total, 36);
        assert_eq!(score.transfer_penalty, 8);
        assert_eq!(score.final_score, 28);
    }

    #[test]
    fn score_rejects_other_gameweeks() {
        let squad = Squad::new(&["a"], &[], "a");
        let points: HashMap<String, i32> = HashMap::new();
        let err = at_gameweek(9, 0).score(&squad, &points, 8).unwrap_err();
        assert!(matches!(err, RulesError::InvalidTransition { .. }));
    }
}
