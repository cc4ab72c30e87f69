//! Mutation events
//!
//! Every user-initiated change is recorded as an immutable [`Event`]. Events
//! travel from the local pending queue into the shared remote log and are
//! replayed by every device during pull.
//!
//! ## Wire format
//!
//! ```json
//! {"id": "<uuid>", "type": "HABIT_TOGGLE",
//!  "payload": {"id": 1, "dayIndex": 5, "value": true},
//!  "ts": 1700000000000, "deviceId": "dev_1700000000000_k3j9x0a1b"}
//! ```

use std::cmp::Ordering;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{EntityId, Habit, Note};

/// Payload naming a single entity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub id: EntityId,
}

/// Payload of a habit check-in change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitToggle {
    pub id: EntityId,
    #[serde(rename = "dayIndex")]
    pub day_index: usize,
    pub value: bool,
}

/// Partial note edit; only present fields are applied
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoteUpdate {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl NoteUpdate {
    /// True if the update carries no field changes
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.title.is_none()
    }
}

/// Kind of mutation, with its typed payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    HabitAdd(Habit),
    HabitDelete(EntityRef),
    HabitToggle(HabitToggle),
    NoteAdd(Note),
    NoteUpdate(NoteUpdate),
    NoteDelete(EntityRef),
}

impl EventKind {
    /// Wire tag of this kind
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::HabitAdd(_) => "HABIT_ADD",
            EventKind::HabitDelete(_) => "HABIT_DELETE",
            EventKind::HabitToggle(_) => "HABIT_TOGGLE",
            EventKind::NoteAdd(_) => "NOTE_ADD",
            EventKind::NoteUpdate(_) => "NOTE_UPDATE",
            EventKind::NoteDelete(_) => "NOTE_DELETE",
        }
    }

    /// Id of the entity this event targets
    pub fn target_id(&self) -> EntityId {
        match self {
            EventKind::HabitAdd(habit) => habit.id,
            EventKind::NoteAdd(note) => note.id,
            EventKind::HabitDelete(r) | EventKind::NoteDelete(r) => r.id,
            EventKind::HabitToggle(toggle) => toggle.id,
            EventKind::NoteUpdate(update) => update.id,
        }
    }
}

/// An immutable record of one mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: EventKind,
    /// Creation time, epoch milliseconds
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(rename = "deviceId")]
    pub device_id: String,
}

impl Event {
    /// Create an event stamped with a fresh id and the current time
    pub fn new(kind: EventKind, device_id: impl Into<String>) -> Self {
        Self::with_timestamp(kind, now_millis(), device_id)
    }

    /// Create an event with an explicit timestamp
    pub fn with_timestamp(kind: EventKind, timestamp: i64, device_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp,
            device_id: device_id.into(),
        }
    }

    /// Replay order: timestamp, then device id, then event id
    ///
    /// The secondary keys only matter for events created in the same
    /// millisecond; they make replay deterministic on every device.
    pub fn replay_order(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.device_id.cmp(&other.device_id))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_new_stamps_fields() {
        let before = now_millis();
        let event = Event::new(EventKind::HabitDelete(EntityRef { id: 4 }), "dev_a");
        assert!(event.timestamp >= before);
        assert_eq!(event.device_id, "dev_a");
        assert_eq!(event.kind.name(), "HABIT_DELETE");
        assert_eq!(event.kind.target_id(), 4);
    }

    #[test]
    fn test_toggle_wire_shape() {
        let event = Event::with_timestamp(
            EventKind::HabitToggle(HabitToggle {
                id: 1,
                day_index: 5,
                value: true,
            }),
            150,
            "dev_b",
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "HABIT_TOGGLE");
        assert_eq!(value["payload"], json!({"id": 1, "dayIndex": 5, "value": true}));
        assert_eq!(value["ts"], 150);
        assert_eq!(value["deviceId"], "dev_b");
        assert!(value["id"].is_string());
    }

    #[test]
    fn test_partial_note_update_omits_absent_fields() {
        let kind = EventKind::NoteUpdate(NoteUpdate {
            id: 9,
            title: Some("Renamed".to_string()),
            content: None,
        });
        let value = serde_json::to_value(Event::with_timestamp(kind, 1, "d")).unwrap();
        assert_eq!(value["payload"], json!({"id": 9, "title": "Renamed"}));
    }

    #[test]
    fn test_parses_event_written_by_other_clients() {
        let raw = json!({
            "id": "6f1c2d4e-8a7b-4c3d-9e2f-1a2b3c4d5e6f",
            "type": "NOTE_ADD",
            "payload": {"id": 7, "title": "Groceries", "content": "milk", "wrap": true},
            "ts": 10,
            "deviceId": "dev_10_abcdefghi"
        });

        let event: Event = serde_json::from_value(raw).unwrap();
        assert_eq!(event.timestamp, 10);
        match event.kind {
            EventKind::NoteAdd(note) => {
                assert_eq!(note.id, 7);
                assert!(note.wrap);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let raw = json!({
            "id": "6f1c2d4e-8a7b-4c3d-9e2f-1a2b3c4d5e6f",
            "type": "HABIT_RENAME",
            "payload": {"id": 1},
            "ts": 10,
            "deviceId": "dev"
        });
        assert!(serde_json::from_value::<Event>(raw).is_err());
    }

    #[test]
    fn test_replay_order_breaks_ties() {
        let kind = EventKind::NoteDelete(EntityRef { id: 1 });
        let a = Event::with_timestamp(kind.clone(), 100, "dev_a");
        let b = Event::with_timestamp(kind.clone(), 100, "dev_b");
        let c = Event::with_timestamp(kind, 99, "dev_z");

        assert_eq!(a.replay_order(&b), Ordering::Less);
        assert_eq!(c.replay_order(&a), Ordering::Less);
        assert_eq!(a.replay_order(&a), Ordering::Equal);
    }
}
