// Chip registry: single-use power-ups, their activation windows, and the
// one-chip-per-gameweek rule.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ensure_valid_gameweek, IneligibleReason, RulesError};
use crate::state::Gameweek;

// ---------------------------------------------------------------------------
// Activation windows
// ---------------------------------------------------------------------------

/// Gameweeks (inclusive) in which the first-half wildcard may be played.
pub const FIRST_WILDCARD_WINDOW: (Gameweek, Gameweek) = (2, 13);

/// Gameweeks (inclusive) in which the second-half wildcard may be played.
pub const SECOND_WILDCARD_WINDOW: (Gameweek, Gameweek) = (14, 27);

// ---------------------------------------------------------------------------
// ChipKind
// ---------------------------------------------------------------------------

/// The five chips every manager receives at the start of the season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChipKind {
    Wildcard1,
    Wildcard2,
    BenchBoost,
    TripleCaptain,
    FreeHit,
}

impl ChipKind {
    pub const ALL: [ChipKind; 5] = [
        ChipKind::Wildcard1,
        ChipKind::Wildcard2,
        ChipKind::BenchBoost,
        ChipKind::TripleCaptain,
        ChipKind::FreeHit,
    ];

    /// Parse the persisted/API name of a chip (`"wildcard1"`, `"benchBoost"`, ...).
    ///
    /// Also accepts snake_case spellings.
    pub fn from_str_kind(s: &str) -> Option<Self> {
        match s {
            "wildcard1" => Some(ChipKind::Wildcard1),
            "wildcard2" => Some(ChipKind::Wildcard2),
            "benchBoost" | "bench_boost" => Some(ChipKind::BenchBoost),
            "tripleCaptain" | "triple_captain" => Some(ChipKind::TripleCaptain),
            "freeHit" | "free_hit" => Some(ChipKind::FreeHit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChipKind::Wildcard1 => "wildcard1",
            ChipKind::Wildcard2 => "wildcard2",
            ChipKind::BenchBoost => "benchBoost",
            ChipKind::TripleCaptain => "tripleCaptain",
            ChipKind::FreeHit => "freeHit",
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, ChipKind::Wildcard1 | ChipKind::Wildcard2)
    }

    /// The inclusive gameweek window the chip is restricted to, if any.
    pub fn window(&self) -> Option<(Gameweek, Gameweek)> {
        match self {
            ChipKind::Wildcard1 => Some(FIRST_WILDCARD_WINDOW),
            ChipKind::Wildcard2 => Some(SECOND_WILDCARD_WINDOW),
            ChipKind::BenchBoost | ChipKind::TripleCaptain | ChipKind::FreeHit => None,
        }
    }
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ChipUsage / ChipsUsed
// ---------------------------------------------------------------------------

/// Usage record for one chip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChipUsage {
    /// Set on activation and never cleared during the season.
    pub used: bool,
    /// Gameweek the chip was played in.
    pub activated_gameweek: Option<Gameweek>,
    /// Whether the chip is currently in effect.
    pub is_active: bool,
}

impl ChipUsage {
    fn is_active_in(&self, gameweek: Gameweek) -> bool {
        self.is_active && self.activated_gameweek == Some(gameweek)
    }
}

/// Usage records for all five chips of a manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChipsUsed {
    #[serde(default)]
    pub wildcard1: ChipUsage,
    #[serde(default)]
    pub wildcard2: ChipUsage,
    #[serde(default)]
    pub bench_boost: ChipUsage,
    #[serde(default)]
    pub triple_captain: ChipUsage,
    #[serde(default)]
    pub free_hit: ChipUsage,
}

impl ChipsUsed {
    pub fn get(&self, kind: ChipKind) -> &ChipUsage {
        match kind {
            ChipKind::Wildcard1 => &self.wildcard1,
            ChipKind::Wildcard2 => &self.wildcard2,
            ChipKind::BenchBoost => &self.bench_boost,
            ChipKind::TripleCaptain => &self.triple_captain,
            ChipKind::FreeHit => &self.free_hit,
        }
    }

    fn get_mut(&mut self, kind: ChipKind) -> &mut ChipUsage {
        match kind {
            ChipKind::Wildcard1 => &mut self.wildcard1,
            ChipKind::Wildcard2 => &mut self.wildcard2,
            ChipKind::BenchBoost => &mut self.bench_boost,
            ChipKind::TripleCaptain => &mut self.triple_captain,
            ChipKind::FreeHit => &mut self.free_hit,
        }
    }

    /// The chip in effect for `gameweek`, if any.
    pub fn active_chip(&self, gameweek: Gameweek) -> Option<ChipKind> {
        ChipKind::ALL
            .into_iter()
            .find(|&kind| self.get(kind).is_active_in(gameweek))
    }

    /// Whether `kind` was activated for `gameweek` and is still in effect.
    pub fn is_active_for(&self, kind: ChipKind, gameweek: Gameweek) -> bool {
        self.get(kind).is_active_in(gameweek)
    }

    /// Chips that have not been played yet this season.
    pub fn available(&self) -> Vec<ChipKind> {
        ChipKind::ALL
            .into_iter()
            .filter(|&kind| !self.get(kind).used)
            .collect()
    }

    /// Check every activation rule for `kind` in `gameweek`.
    ///
    /// Rules are checked in order: single use, gameweek window, then the
    /// one-chip-per-gameweek rule. The first failing rule is reported.
    pub fn check_activation(
        &self,
        kind: ChipKind,
        gameweek: Gameweek,
    ) -> Result<(), IneligibleReason> {
        if self.get(kind).used {
            return Err(IneligibleReason::AlreadyUsed);
        }

        if let Some((first, last)) = kind.window() {
            if !(first..=last).contains(&gameweek) {
                return Err(IneligibleReason::OutsideWindow { first, last });
            }
        }

        let other_active = ChipKind::ALL
            .into_iter()
            .filter(|&other| other != kind)
            .find(|&other| self.get(other).is_active_in(gameweek));
        if let Some(other) = other_active {
            return Err(IneligibleReason::AnotherChipActive(other));
        }

        Ok(())
    }

    pub fn can_activate(&self, kind: ChipKind, gameweek: Gameweek) -> bool {
        self.check_activation(kind, gameweek).is_ok()
    }

    /// Play `kind` in `gameweek`.
    ///
    /// Every other chip's `is_active` flag is cleared before the target is
    /// marked used and active. The receiver is left untouched on rejection.
    pub fn activate(&self, kind: ChipKind, gameweek: Gameweek) -> Result<ChipsUsed, RulesError> {
        ensure_valid_gameweek(gameweek)?;
        self.check_activation(kind, gameweek)
            .map_err(|reason| RulesError::IneligibleChipActivation { chip: kind, reason })?;

        let mut next = self.clone();
        for other in ChipKind::ALL {
            next.get_mut(other).is_active = false;
        }
        *next.get_mut(kind) = ChipUsage {
            used: true,
            activated_gameweek: Some(gameweek),
            is_active: true,
        };
        debug!("chip {} activated for gameweek {}", kind, gameweek);
        Ok(next)
    }

    /// Take `kind` out of effect. `used` stays set.
    pub fn deactivate(&self, kind: ChipKind) -> ChipsUsed {
        let mut next = self.clone();
        next.get_mut(kind).is_active = false;
        next
    }

    /// Clear `is_active` on every chip played before `gameweek`.
    pub fn expire_before(&self, gameweek: Gameweek) -> ChipsUsed {
        let mut next = self.clone();
        for kind in ChipKind::ALL {
            let usage = next.get_mut(kind);
            let stale = usage
                .activated_gameweek
                .map_or(true, |activated| activated < gameweek);
            if usage.is_active && stale {
                debug!("chip {} expired at start of gameweek {}", kind, gameweek);
                usage.is_active = false;
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn played(kind: ChipKind, gameweek: Gameweek) -> ChipsUsed {
        ChipsUsed::default()
            .activate(kind, gameweek)
            .expect("fresh chip should activate")
    }

    // --- Single use ---

    #[test]
    fn fresh_chips_are_all_available() {
        let chips = ChipsUsed::default();
        assert_eq!(chips.available().len(), 5);
        assert!(chips.active_chip(5).is_none());
    }

    #[test]
    fn used_chip_cannot_be_activated_again() {
        let chips = played(ChipKind::BenchBoost, 5).expire_before(6);
        assert_eq!(
            chips.check_activation(ChipKind::BenchBoost, 9),
            Err(IneligibleReason::AlreadyUsed)
        );
    }

    #[test]
    fn used_flag_survives_deactivation() {
        let chips = played(ChipKind::TripleCaptain, 8).deactivate(ChipKind::TripleCaptain);
        let usage = chips.get(ChipKind::TripleCaptain);
        assert!(usage.used);
        assert!(!usage.is_active);
        assert_eq!(usage.activated_gameweek, Some(8));
    }

    // --- Windows ---

    #[test]
    fn first_wildcard_window() {
        let chips = ChipsUsed::default();
        assert!(!chips.can_activate(ChipKind::Wildcard1, 1));
        assert!(chips.can_activate(ChipKind::Wildcard1, 2));
        assert!(chips.can_activate(ChipKind::Wildcard1, 13));
        assert_eq!(
            chips.check_activation(ChipKind::Wildcard1, 14),
            Err(IneligibleReason::OutsideWindow { first: 2, last: 13 })
        );
    }

    #[test]
    fn second_wildcard_window() {
        let chips = ChipsUsed::default();
        assert!(!chips.can_activate(ChipKind::Wildcard2, 1));
        assert!(!chips.can_activate(ChipKind::Wildcard2, 13));
        assert!(chips.can_activate(ChipKind::Wildcard2, 14));
        assert!(chips.can_activate(ChipKind::Wildcard2, 27));
        assert!(!chips.can_activate(ChipKind::Wildcard2, 28));
    }

    #[test]
    fn non_wildcard_chips_have_no_window() {
        let chips = ChipsUsed::default();
        for gw in [1, 13, 20, 38] {
            assert!(chips.can_activate(ChipKind::BenchBoost, gw));
            assert!(chips.can_activate(ChipKind::TripleCaptain, gw));
            assert!(chips.can_activate(ChipKind::FreeHit, gw));
        }
    }

    // --- Exclusivity ---

    #[test]
    fn one_chip_per_gameweek() {
        for kind in ChipKind::ALL {
            let gw = if kind == ChipKind::Wildcard2 { 20 } else { 10 };
            let chips = played(kind, gw);
            for other in ChipKind::ALL.into_iter().filter(|&o| o != kind) {
                assert!(
                    !chips.can_activate(other, gw),
                    "{other} should be blocked while {kind} is active"
                );
            }
        }
    }

    #[test]
    fn exclusivity_reports_the_blocking_chip() {
        let chips = played(ChipKind::FreeHit, 10);
        assert_eq!(
            chips.check_activation(ChipKind::TripleCaptain, 10),
            Err(IneligibleReason::AnotherChipActive(ChipKind::FreeHit))
        );
    }

    #[test]
    fn chip_from_previous_gameweek_does_not_block() {
        // Still flagged active because no transition ran, but it belongs to GW 9.
        let chips = played(ChipKind::BenchBoost, 9);
        assert!(chips.can_activate(ChipKind::TripleCaptain, 10));
    }

    #[test]
    fn activation_clears_stale_active_flags() {
        let chips = played(ChipKind::BenchBoost, 9)
            .activate(ChipKind::TripleCaptain, 10)
            .unwrap();
        assert!(!chips.get(ChipKind::BenchBoost).is_active);
        assert_eq!(chips.active_chip(10), Some(ChipKind::TripleCaptain));
    }

    #[test]
    fn rejected_activation_reports_chip_and_reason() {
        let chips = played(ChipKind::Wildcard1, 4);
        let err = chips.activate(ChipKind::BenchBoost, 4).unwrap_err();
        assert_eq!(
            err,
            RulesError::IneligibleChipActivation {
                chip: ChipKind::BenchBoost,
                reason: IneligibleReason::AnotherChipActive(ChipKind::Wildcard1),
            }
        );
        // Receiver unchanged
        assert!(!chips.get(ChipKind::BenchBoost).used);
    }

    #[test]
    fn activate_rejects_gameweek_zero() {
        let err = ChipsUsed::default()
            .activate(ChipKind::BenchBoost, 0)
            .unwrap_err();
        assert_eq!(err, RulesError::InvalidGameweek(0));
    }

    // --- Expiry ---

    #[test]
    fn expire_before_only_touches_older_chips() {
        let chips = played(ChipKind::FreeHit, 12);
        assert!(chips.expire_before(12).is_active_for(ChipKind::FreeHit, 12));
        let expired = chips.expire_before(13);
        assert!(!expired.get(ChipKind::FreeHit).is_active);
        assert!(expired.get(ChipKind::FreeHit).used);
    }

    // --- Names ---

    #[test]
    fn chip_names_round_trip_through_from_str_kind() {
        for kind in ChipKind::ALL {
            assert_eq!(ChipKind::from_str_kind(kind.as_str()), Some(kind));
        }
        assert_eq!(ChipKind::from_str_kind("bench_boost"), Some(ChipKind::BenchBoost));
        assert_eq!(ChipKind::from_str_kind("powerPlay"), None);
    }

    #[test]
    fn serde_uses_camel_case_names() {
        let json = serde_json::to_value(played(ChipKind::TripleCaptain, 3)).unwrap();
        assert_eq!(json["tripleCaptain"]["used"], true);
        assert_eq!(json["tripleCaptain"]["activatedGameweek"], 3);
        assert_eq!(json["tripleCaptain"]["isActive"], true);
        assert_eq!(json["benchBoost"]["used"], false);
        assert_eq!(
            serde_json::to_string(&ChipKind::FreeHit).unwrap(),
            "\"freeHit\""
        );
    }
}
