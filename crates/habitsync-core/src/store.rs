//! Unified storage interface
//!
//! The `Store` owns the habit and note collections and coordinates between:
//! - the local key-value store (materialized collections)
//! - the event log (pending queue for sync)
//!
//! ## Mutations
//!
//! Every mutation validates its target, queues exactly one event, then
//! updates and persists the collections. Sync replaces the collections with
//! the merged result.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open()?;  // Creates or loads existing
//!
//! let habit = store.add_habit("Stretch")?;
//! store.toggle_habit(habit.id, None, true)?;
//!
//! let engine = store.engine(Arc::new(DirectoryRemote::new("/mnt/shared")));
//! store.sync(&engine).await?;
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::event::{now_millis, EntityRef, EventKind, HabitToggle, NoteUpdate};
use crate::event_log::EventLog;
use crate::models::{EntityId, Habit, Note};
use crate::remote::RemoteStore;
use crate::storage::{read_json, write_json, FileKv, KeyValueStore, StorageError};
use crate::sync::{SyncEngine, SyncReport, SyncState};

/// Local storage key of the habit collection
pub const HABITS_KEY: &str = "habits";

/// Local storage key of the note collection
pub const NOTES_KEY: &str = "notes";

/// Errors from store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No habit with id {0}")]
    UnknownHabit(EntityId),

    #[error("No note with id {0}")]
    UnknownNote(EntityId),

    #[error("Day {day} is outside the {len}-day history")]
    DayOutOfRange { day: usize, len: usize },

    #[error("Nothing to change on note {0}")]
    EmptyUpdate(EntityId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Unified storage interface for HabitSync
pub struct Store {
    kv: Arc<dyn KeyValueStore>,
    log: EventLog,
    config: Config,
    habits: Vec<Habit>,
    notes: Vec<Note>,
}

impl Store {
    /// Open the store under the configured data directory
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the store with a specific configuration
    pub fn open_with_config(config: Config) -> Result<Self> {
        let kv = FileKv::open(config.state_dir()).context("Failed to open local state")?;
        Ok(Self::with_kv(Arc::new(kv), config))
    }

    /// Open the store over an existing key-value store
    ///
    /// Missing or corrupt collections load as empty.
    pub fn with_kv(kv: Arc<dyn KeyValueStore>, config: Config) -> Self {
        let habits = read_json(kv.as_ref(), HABITS_KEY).unwrap_or_default();
        let notes = read_json(kv.as_ref(), NOTES_KEY).unwrap_or_default();
        Self {
            log: EventLog::new(kv.clone()),
            kv,
            config,
            habits,
            notes,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn device_id(&self) -> String {
        self.log.device_id()
    }

    // ==================== Habit Operations ====================

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn find_habit(&self, id: EntityId) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == id)
    }

    /// Add a new habit with an empty history
    pub fn add_habit(&mut self, name: &str) -> Result<Habit, StoreError> {
        let habit = Habit::new(self.next_id(), name.trim());
        self.log.log_event(EventKind::HabitAdd(habit.clone()))?;
        self.habits.push(habit.clone());
        self.save_habits()?;
        Ok(habit)
    }

    /// Check or uncheck one day; `None` means today
    pub fn toggle_habit(
        &mut self,
        id: EntityId,
        day_index: Option<usize>,
        value: bool,
    ) -> Result<Habit, StoreError> {
        let index = self.habit_index(id)?;
        let len = self.habits[index].history.len();
        let day = match day_index.or_else(|| self.habits[index].today_index()) {
            Some(day) if day < len => day,
            day => {
                return Err(StoreError::DayOutOfRange {
                    day: day.unwrap_or(0),
                    len,
                })
            }
        };

        self.log.log_event(EventKind::HabitToggle(HabitToggle {
            id,
            day_index: day,
            value,
        }))?;

        let habit = &mut self.habits[index];
        habit.set_day(day, value);
        habit.recompute_streak();
        let habit = habit.clone();
        self.save_habits()?;
        Ok(habit)
    }

    /// Delete a habit
    pub fn delete_habit(&mut self, id: EntityId) -> Result<Habit, StoreError> {
        let index = self.habit_index(id)?;
        self.log.log_event(EventKind::HabitDelete(EntityRef { id }))?;
        let habit = self.habits.remove(index);
        self.save_habits()?;
        Ok(habit)
    }

    // ==================== Note Operations ====================

    /// Notes, newest first
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn find_note(&self, id: EntityId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Add a new note at the front of the list
    pub fn add_note(&mut self, title: &str, content: &str, wrap: bool) -> Result<Note, StoreError> {
        let note = Note::new(self.next_id(), title, content).with_wrap(wrap);
        self.log.log_event(EventKind::NoteAdd(note.clone()))?;
        self.notes.insert(0, note.clone());
        self.save_notes()?;
        Ok(note)
    }

    /// Change the title and/or content of a note
    pub fn update_note(
        &mut self,
        id: EntityId,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Note, StoreError> {
        let index = self.note_index(id)?;
        let update = NoteUpdate { id, content, title };
        if update.is_empty() {
            return Err(StoreError::EmptyUpdate(id));
        }

        self.log.log_event(EventKind::NoteUpdate(update.clone()))?;

        let note = &mut self.notes[index];
        if let Some(title) = update.title {
            note.title = title;
        }
        if let Some(content) = update.content {
            note.content = content;
        }
        let note = note.clone();
        self.save_notes()?;
        Ok(note)
    }

    /// Delete a note
    pub fn delete_note(&mut self, id: EntityId) -> Result<Note, StoreError> {
        let index = self.note_index(id)?;
        self.log.log_event(EventKind::NoteDelete(EntityRef { id }))?;
        let note = self.notes.remove(index);
        self.save_notes()?;
        Ok(note)
    }

    // ==================== Sync ====================

    /// Replace both collections, as after a merge
    ///
    /// Streaks are recomputed since replay leaves them untouched. No events
    /// are logged.
    pub fn replace_all(&mut self, habits: Vec<Habit>, notes: Vec<Note>) -> Result<(), StoreError> {
        self.habits = habits;
        for habit in &mut self.habits {
            habit.recompute_streak();
        }
        self.notes = notes;
        self.save_habits()?;
        self.save_notes()
    }

    /// Sync watermarks kept alongside the collections
    pub fn sync_state(&self) -> SyncState {
        SyncState::new(self.kv.clone())
    }

    /// Sync engine over this store's local state
    pub fn engine(&self, remote: Arc<dyn RemoteStore>) -> SyncEngine {
        SyncEngine::new(self.kv.clone(), remote)
            .with_snapshot_interval(self.config.snapshot_interval())
    }

    /// Run one sync cycle against the configured account
    ///
    /// Sync failures are reported in the returned [`SyncReport`]; only
    /// failing to persist the merged state is an error.
    pub async fn sync(&mut self, engine: &SyncEngine) -> Result<SyncReport, StoreError> {
        let account = self.config.sync_account().map(str::to_owned);
        let report = engine
            .sync_cycle(account.as_deref(), &self.habits, &self.notes)
            .await;

        if let Some(merged) = &report.merged {
            debug!(
                "Replacing local state with merged result ({} habits, {} notes)",
                merged.habits.len(),
                merged.notes.len()
            );
            self.replace_all(merged.habits.clone(), merged.notes.clone())?;
        }
        Ok(report)
    }

    /// Allocate an id for a new entity
    ///
    /// Millisecond timestamp, bumped past every existing id so adds in a
    /// tight loop stay unique.
    pub fn next_id(&self) -> EntityId {
        let now = u64::try_from(now_millis()).unwrap_or(0);
        let max_existing = self
            .habits
            .iter()
            .map(|h| h.id)
            .chain(self.notes.iter().map(|n| n.id))
            .max();
        match max_existing {
            Some(max) if max >= now => max + 1,
            _ => now,
        }
    }

    fn habit_index(&self, id: EntityId) -> Result<usize, StoreError> {
        self.habits
            .iter()
            .position(|h| h.id == id)
            .ok_or(StoreError::UnknownHabit(id))
    }

    fn note_index(&self, id: EntityId) -> Result<usize, StoreError> {
        self.notes
            .iter()
            .position(|n| n.id == id)
            .ok_or(StoreError::UnknownNote(id))
    }

    fn save_habits(&self) -> Result<(), StoreError> {
        Ok(write_json(self.kv.as_ref(), HABITS_KEY, &self.habits)?)
    }

    fn save_notes(&self) -> Result<(), StoreError> {
        Ok(write_json(self.kv.as_ref(), NOTES_KEY, &self.notes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use crate::storage::MemoryKv;
    use crate::sync::PushOutcome;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            account_id: Some("user-1".to_string()),
            sync_enabled: true,
            ..Config::default()
        }
    }

    fn memory_store(temp_dir: &TempDir) -> Store {
        Store::with_kv(Arc::new(MemoryKv::new()), test_config(temp_dir))
    }

    #[test]
    fn test_open_creates_state_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let mut store = Store::open_with_config(config.clone()).unwrap();
        store.add_habit("Walk").unwrap();

        assert!(config.state_dir().join("habits.json").exists());
        assert!(config.state_dir().join("pending_events.json").exists());
        assert!(config.state_dir().join("device_id.json").exists());
    }

    #[test]
    fn test_data_persists_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let device_id;
        {
            let mut store = Store::open_with_config(config.clone()).unwrap();
            device_id = store.device_id();
            let habit = store.add_habit("Journal").unwrap();
            store.toggle_habit(habit.id, None, true).unwrap();
            store.add_note("Persistent Note", "Body content", true).unwrap();
        }

        let store = Store::open_with_config(config).unwrap();
        assert_eq!(store.device_id(), device_id);
        assert_eq!(store.habits().len(), 1);
        assert_eq!(store.habits()[0].streak, 1);
        assert_eq!(store.notes()[0].content, "Body content");
        assert!(store.notes()[0].wrap);
        assert_eq!(store.event_log().pending_count(), 3);
    }

    #[test]
    fn test_each_mutation_logs_one_event() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = memory_store(&temp_dir);

        let habit = store.add_habit("Read").unwrap();
        store.toggle_habit(habit.id, Some(100), true).unwrap();
        let note = store.add_note("Title", "", false).unwrap();
        store
            .update_note(note.id, None, Some("text".to_string()))
            .unwrap();
        store.delete_note(note.id).unwrap();
        store.delete_habit(habit.id).unwrap();

        let names: Vec<_> = store
            .event_log()
            .pending()
            .iter()
            .map(|e| e.kind.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "HABIT_ADD",
                "HABIT_TOGGLE",
                "NOTE_ADD",
                "NOTE_UPDATE",
                "NOTE_DELETE",
                "HABIT_DELETE"
            ]
        );
        assert!(store.habits().is_empty());
        assert!(store.notes().is_empty());
    }

    #[test]
    fn test_toggle_defaults_to_today_and_updates_streak() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = memory_store(&temp_dir);
        let habit = store.add_habit("Meditate").unwrap();

        let last = habit.history.len() - 1;
        store.toggle_habit(habit.id, Some(last - 1), true).unwrap();
        let habit = store.toggle_habit(habit.id, None, true).unwrap();
        assert!(habit.history[last]);
        assert_eq!(habit.streak, 2);

        let habit = store.toggle_habit(habit.id, None, false).unwrap();
        assert_eq!(habit.streak, 1);
    }

    #[test]
    fn test_invalid_targets_log_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = memory_store(&temp_dir);
        let habit = store.add_habit("Run").unwrap();
        let note = store.add_note("n", "", false).unwrap();
        let before = store.event_log().pending_count();

        assert!(matches!(
            store.toggle_habit(habit.id, Some(365), true),
            Err(StoreError::DayOutOfRange { day: 365, len: 365 })
        ));
        assert!(matches!(
            store.delete_habit(42),
            Err(StoreError::UnknownHabit(42))
        ));
        assert!(matches!(
            store.update_note(42, Some("t".to_string()), None),
            Err(StoreError::UnknownNote(42))
        ));
        assert!(matches!(
            store.update_note(note.id, None, None),
            Err(StoreError::EmptyUpdate(_))
        ));

        assert_eq!(store.event_log().pending_count(), before);
    }

    #[test]
    fn test_notes_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = memory_store(&temp_dir);
        let first = store.add_note("first", "", false).unwrap();
        let second = store.add_note("second", "", false).unwrap();

        let ids: Vec<_> = store.notes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(store.find_note(first.id).unwrap().title, "first");
    }

    #[test]
    fn test_ids_unique_in_tight_loop() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = memory_store(&temp_dir);
        for i in 0..50 {
            store.add_habit(&format!("habit {}", i)).unwrap();
        }

        let mut ids: Vec<_> = store.habits().iter().map(|h| h.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 50);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_corrupt_collections_load_empty() {
        let temp_dir = TempDir::new().unwrap();
        let kv = Arc::new(MemoryKv::new());
        kv.set(HABITS_KEY, "[{broken").unwrap();
        kv.set(NOTES_KEY, "42").unwrap();

        let store = Store::with_kv(kv, test_config(&temp_dir));
        assert!(store.habits().is_empty());
        assert!(store.notes().is_empty());
    }

    #[test]
    fn test_replace_all_recomputes_streaks() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = memory_store(&temp_dir);

        let mut habit = Habit::new(7, "Floss");
        let last = habit.history.len() - 1;
        habit.set_day(last, true);
        habit.set_day(last - 1, true);
        store.replace_all(vec![habit], vec![]).unwrap();

        assert_eq!(store.find_habit(7).unwrap().streak, 2);
        assert_eq!(store.event_log().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_two_stores_converge_through_sync() {
        let temp_dir = TempDir::new().unwrap();
        let remote = MemoryRemote::new();

        let mut phone = memory_store(&temp_dir);
        let mut laptop = memory_store(&temp_dir);
        let phone_engine = phone.engine(Arc::new(remote.clone()));
        let laptop_engine = laptop.engine(Arc::new(remote.clone()));

        let habit = phone.add_habit("Stretch").unwrap();
        phone.toggle_habit(habit.id, None, true).unwrap();
        laptop.add_note("Groceries", "milk", false).unwrap();

        let report = phone.sync(&phone_engine).await.unwrap();
        assert_eq!(report.push, PushOutcome::Created(2));
        laptop.sync(&laptop_engine).await.unwrap();
        phone.sync(&phone_engine).await.unwrap();

        assert_eq!(phone.habits(), laptop.habits());
        assert_eq!(phone.notes(), laptop.notes());
        assert_eq!(laptop.habits()[0].streak, 1);
        assert!(phone.event_log().is_empty());
        assert!(laptop.event_log().is_empty());
        assert!(phone.sync_state().checkpoint() > 0);
    }

    #[tokio::test]
    async fn test_sync_without_account_changes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let remote = MemoryRemote::new();
        let mut store = Store::with_kv(
            Arc::new(MemoryKv::new()),
            Config {
                data_dir: temp_dir.path().to_path_buf(),
                ..Config::default()
            },
        );
        let engine = store.engine(Arc::new(remote.clone()));
        store.add_habit("Run").unwrap();

        let report = store.sync(&engine).await.unwrap();
        assert_eq!(report.push, PushOutcome::Skipped);
        assert_eq!(store.event_log().pending_count(), 1);
        assert_eq!(remote.write_count(), 0);
    }
}
