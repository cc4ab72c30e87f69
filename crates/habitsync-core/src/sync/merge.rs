//! Event replay
//!
//! Applies events to the habit and note collections. Replay is a pure
//! function of the starting collections and the event sequence; the sync
//! pipeline guarantees the sequence is in [`Event::replay_order`].
//!
//! Rules:
//! - adds are skipped when the id already exists
//! - deletes of unknown ids are no-ops
//! - toggles overwrite one history slot and leave `streak` alone
//! - note updates only touch the fields they carry
//!
//! Concurrent edits to the same field resolve to whichever event replays
//! last. There is no field-level merge.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::{Event, EventKind};
use crate::models::{Habit, Note};

/// The materialized entity state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collections {
    pub habits: Vec<Habit>,
    pub notes: Vec<Note>,
}

impl Collections {
    pub fn new(habits: Vec<Habit>, notes: Vec<Note>) -> Self {
        Self { habits, notes }
    }

    /// Apply one event; returns whether the collections changed
    pub fn apply(&mut self, event: &Event) -> bool {
        match &event.kind {
            EventKind::HabitAdd(habit) => {
                if self.habits.iter().any(|h| h.id == habit.id) {
                    debug!("Skipping duplicate habit add {}", habit.id);
                    return false;
                }
                self.habits.push(habit.clone());
                true
            }
            EventKind::HabitDelete(target) => {
                let before = self.habits.len();
                self.habits.retain(|h| h.id != target.id);
                self.habits.len() != before
            }
            EventKind::HabitToggle(toggle) => {
                let Some(habit) = self.habits.iter_mut().find(|h| h.id == toggle.id) else {
                    return false;
                };
                if !habit.set_day(toggle.day_index, toggle.value) {
                    warn!(
                        "Ignoring toggle of day {} on habit {} (history has {} days)",
                        toggle.day_index,
                        toggle.id,
                        habit.history.len()
                    );
                    return false;
                }
                true
            }
            EventKind::NoteAdd(note) => {
                if self.notes.iter().any(|n| n.id == note.id) {
                    debug!("Skipping duplicate note add {}", note.id);
                    return false;
                }
                // Newest notes first
                self.notes.insert(0, note.clone());
                true
            }
            EventKind::NoteUpdate(update) => {
                let Some(note) = self.notes.iter_mut().find(|n| n.id == update.id) else {
                    return false;
                };
                if let Some(content) = &update.content {
                    note.content = content.clone();
                }
                if let Some(title) = &update.title {
                    note.title = title.clone();
                }
                !update.is_empty()
            }
            EventKind::NoteDelete(target) => {
                let before = self.notes.len();
                self.notes.retain(|n| n.id != target.id);
                self.notes.len() != before
            }
        }
    }

    /// Apply events in the order given; returns how many changed state
    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) -> usize {
        events.into_iter().filter(|e| self.apply(e)).count()
    }
}

/// Sort events into replay order
pub fn sort_for_replay(events: &mut [Event]) {
    events.sort_by(Event::replay_order);
}

/// Replay `events` onto `base` after sorting them
pub fn replay(mut base: Collections, events: &[Event]) -> Collections {
    let mut ordered = events.to_vec();
    sort_for_replay(&mut ordered);
    base.apply_all(&ordered);
    base
}
