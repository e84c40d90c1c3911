// Season deadline schedule: decides which gameweek is open for changes.

use chrono::{DateTime, Utc};
use matchday_core::sources::GameweekWindowOracle;
use matchday_core::Gameweek;

use crate::config::SeasonConfig;

/// Gameweek deadlines for one season, in gameweek order.
///
/// Gameweek `g` is open from the previous gameweek's deadline (or forever
/// before, for gameweek 1) until its own deadline.
#[derive(Debug, Clone)]
pub struct SeasonSchedule {
    deadlines: Vec<DateTime<Utc>>,
}

impl SeasonSchedule {
    pub fn new(deadlines: Vec<DateTime<Utc>>) -> Self {
        SeasonSchedule { deadlines }
    }

    pub fn from_config(season: &SeasonConfig) -> Self {
        Self::new(season.deadlines.clone())
    }

    /// Number of gameweeks in the season.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Transfer deadline of `gameweek`, if the season has one.
    pub fn deadline(&self, gameweek: Gameweek) -> Option<DateTime<Utc>> {
        let index = usize::try_from(gameweek).ok()?.checked_sub(1)?;
        self.deadlines.get(index).copied()
    }

    pub fn is_gameweek_open_at(&self, gameweek: Gameweek, now: DateTime<Utc>) -> bool {
        let Some(deadline) = self.deadline(gameweek) else {
            return false;
        };
        if now >= deadline {
            return false;
        }
        match gameweek.checked_sub(1).and_then(|prev| self.deadline(prev)) {
            Some(previous_deadline) => now >= previous_deadline,
            None => true,
        }
    }

    /// The first gameweek whose deadline is still ahead of `now`.
    pub fn current_open_gameweek_at(&self, now: DateTime<Utc>) -> Option<Gameweek> {
        self.deadlines
            .iter()
            .position(|deadline| now < *deadline)
            .and_then(|index| Gameweek::try_from(index + 1).ok())
    }
}

impl GameweekWindowOracle for SeasonSchedule {
    fn is_gameweek_open(&self, gameweek: Gameweek) -> bool {
        self.is_gameweek_open_at(gameweek, Utc::now())
    }

    fn current_open_gameweek(&self) -> Option<Gameweek> {
        self.current_open_gameweek_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, hour, 0, 0).unwrap()
    }

    /// Deadlines on the 7th, 14th and 21st at 18:00.
    fn schedule() -> SeasonSchedule {
        SeasonSchedule::new(vec![at(7, 18), at(14, 18), at(21, 18)])
    }

    #[test]
    fn gameweek_one_is_open_until_its_deadline() {
        let s = schedule();
        assert!(s.is_gameweek_open_at(1, at(1, 0)));
        assert!(!s.is_gameweek_open_at(1, at(7, 18)));
        assert!(!s.is_gameweek_open_at(2, at(1, 0)));
    }

    #[test]
    fn later_gameweek_opens_at_previous_deadline() {
        let s = schedule();
        assert!(s.is_gameweek_open_at(2, at(7, 18)));
        assert!(s.is_gameweek_open_at(2, at(14, 17)));
        assert!(!s.is_gameweek_open_at(2, at(14, 18)));
        assert!(s.is_gameweek_open_at(3, at(14, 18)));
    }

    #[test]
    fn current_open_gameweek_follows_deadlines() {
        let s = schedule();
        assert_eq!(s.current_open_gameweek_at(at(1, 0)), Some(1));
        assert_eq!(s.current_open_gameweek_at(at(10, 12)), Some(2));
        assert_eq!(s.current_open_gameweek_at(at(21, 17)), Some(3));
        assert_eq!(s.current_open_gameweek_at(at(21, 18)), None);
    }

    #[test]
    fn unknown_gameweeks_are_never_open() {
        let s = schedule();
        assert!(!s.is_gameweek_open_at(0, at(1, 0)));
        assert!(!s.is_gameweek_open_at(4, at(21, 19)));
        assert_eq!(s.deadline(0), None);
        assert_eq!(s.deadline(3), Some(at(21, 18)));
        assert_eq!(s.len(), 3);
    }
}
