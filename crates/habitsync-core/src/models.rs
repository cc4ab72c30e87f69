//! Data models for HabitSync
//!
//! Defines the entity collections the sync engine reconciles: habits with a
//! rolling one-year check-in history, and free-form notes.

use serde::{Deserialize, Serialize};

/// Identifier shared by habits and notes
pub type EntityId = u64;

/// Number of days tracked in a habit's history
pub const HISTORY_DAYS: usize = 365;

/// A tracked habit
///
/// `history` is a rolling window whose last element is today.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: EntityId,
    pub name: String,
    /// Consecutive checked days ending today (or yesterday)
    pub streak: u32,
    pub history: Vec<bool>,
}

impl Habit {
    /// Create a habit with an empty history
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            streak: 0,
            history: vec![false; HISTORY_DAYS],
        }
    }

    /// Index of today in `history`
    pub fn today_index(&self) -> Option<usize> {
        self.history.len().checked_sub(1)
    }

    /// Set the check-in for one day
    ///
    /// Returns `false` without changing anything if `day_index` is outside
    /// the history window. The streak is not recomputed.
    pub fn set_day(&mut self, day_index: usize, value: bool) -> bool {
        match self.history.get_mut(day_index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Recompute `streak` from `history`
    ///
    /// An unchecked today does not break the streak yet; the run ending
    /// yesterday is counted instead.
    pub fn recompute_streak(&mut self) -> u32 {
        let mut days = self.history.iter().rev().peekable();
        if days.peek() == Some(&&false) {
            days.next();
        }
        self.streak = days.take_while(|checked| **checked).count() as u32;
        self.streak
    }
}

/// A text note
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    /// Whether the front end soft-wraps the content
    pub wrap: bool,
}

impl Note {
    pub fn new(id: EntityId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            wrap: false,
        }
    }

    /// Builder-style setter for `wrap`
    pub fn with_wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_habit_new() {
        let habit = Habit::new(1, "Run");
        assert_eq!(habit.name, "Run");
        assert_eq!(habit.streak, 0);
        assert_eq!(habit.history.len(), HISTORY_DAYS);
        assert!(habit.history.iter().all(|d| !d));
        assert_eq!(habit.today_index(), Some(HISTORY_DAYS - 1));
    }

    #[test]
    fn test_set_day_out_of_range() {
        let mut habit = Habit::new(1, "Run");
        assert!(habit.set_day(5, true));
        assert!(habit.history[5]);
        assert!(!habit.set_day(HISTORY_DAYS, true));
    }

    #[test]
    fn test_streak_counts_run_ending_today() {
        let mut habit = Habit::new(1, "Read");
        let today = HISTORY_DAYS - 1;
        for day in today - 2..=today {
            habit.set_day(day, true);
        }
        habit.set_day(today - 10, true);
        assert_eq!(habit.recompute_streak(), 3);
        assert_eq!(habit.streak, 3);
    }

    #[test]
    fn test_streak_tolerates_unchecked_today() {
        let mut habit = Habit::new(1, "Read");
        let today = HISTORY_DAYS - 1;
        habit.set_day(today - 1, true);
        habit.set_day(today - 2, true);
        assert_eq!(habit.recompute_streak(), 2);

        // Two unchecked days in a row break it
        habit.set_day(today - 1, false);
        assert_eq!(habit.recompute_streak(), 0);
    }

    #[test]
    fn test_streak_empty_history() {
        let mut habit = Habit::new(1, "Read");
        habit.history.clear();
        assert_eq!(habit.recompute_streak(), 0);
        assert_eq!(habit.today_index(), None);
    }

    #[test]
    fn test_note_new() {
        let note = Note::new(7, "Ideas", "ship it").with_wrap(true);
        assert_eq!(note.title, "Ideas");
        assert_eq!(note.content, "ship it");
        assert!(note.wrap);
    }

    #[test]
    fn test_habit_json_shape() {
        let habit = Habit::new(3, "Stretch");
        let json = serde_json::to_value(&habit).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["history"].as_array().unwrap().len(), HISTORY_DAYS);
    }
}
