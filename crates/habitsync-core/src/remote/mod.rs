//! Remote event store
//!
//! The shared side of sync. Each account owns two records:
//!
//! - a **sync-event record** ([`SyncDocument`]): `{lastUpdated, events: [..]}`,
//!   the accumulating log every device appends to
//! - a **primary record**, owned by profile code elsewhere, on which
//!   compaction stores `lastSnapshot` ([`Snapshot`])
//!
//! The engine only needs get / create / append-merge / overwrite on the
//! event record and read/write of the snapshot field. Stores:
//!
//! - [`MemoryRemote`]: shared in-process store, for tests and embedding
//! - [`DirectoryRemote`]: JSON files under a shared directory

mod directory;
mod memory;

pub use directory::DirectoryRemote;
pub use memory::MemoryRemote;

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::event::Event;
use crate::models::{Habit, Note};

/// Errors reported by a remote store
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The account has no sync-event record yet
    #[error("No sync record exists for account '{account}'")]
    NotFound { account: String },

    /// `create` was called for an account that already has a record
    #[error("A sync record already exists for account '{account}'")]
    AlreadyExists { account: String },

    /// Account id cannot address a record
    #[error("Invalid account id '{0}'")]
    InvalidAccount(String),

    /// Store I/O failed
    #[error("Remote I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be parsed or encoded
    #[error("Malformed remote record '{what}': {source}")]
    Malformed {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// The store cannot be reached
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// The record is missing (first sync ever for the account)
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Sync-event record of one account
///
/// Events are decoded one by one. An entry this client cannot read (an
/// unknown `type` from a newer client, or a bad payload) is kept verbatim in
/// `unreadable` and written back on the next save, so it never blocks the
/// rest of the log.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(from = "RawDocument")]
pub struct SyncDocument {
    /// Epoch milliseconds of the last write
    pub last_updated: i64,
    pub events: Vec<Event>,
    /// Entries that failed to decode, in log order
    pub unreadable: Vec<Value>,
}

/// Wire form of [`SyncDocument`], before events are decoded
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    last_updated: i64,
    #[serde(default)]
    events: Vec<Value>,
}

impl From<RawDocument> for SyncDocument {
    fn from(raw: RawDocument) -> Self {
        let mut events = Vec::with_capacity(raw.events.len());
        let mut unreadable = Vec::new();
        for value in raw.events {
            match Event::deserialize(&value) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("Skipping unreadable remote event {}: {}", value, e);
                    unreadable.push(value);
                }
            }
        }
        Self {
            last_updated: raw.last_updated,
            events,
            unreadable,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum LogEntry<'a> {
    Event(&'a Event),
    Raw(&'a Value),
}

struct LogEntries<'a>(&'a SyncDocument);

impl Serialize for LogEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let doc = self.0;
        serializer.collect_seq(
            doc.events
                .iter()
                .map(LogEntry::Event)
                .chain(doc.unreadable.iter().map(LogEntry::Raw)),
        )
    }
}

impl Serialize for SyncDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SyncDocument", 2)?;
        state.serialize_field("lastUpdated", &self.last_updated)?;
        state.serialize_field("events", &LogEntries(self))?;
        state.end()
    }
}

impl SyncDocument {
    pub fn new(last_updated: i64, events: Vec<Event>) -> Self {
        Self {
            last_updated,
            events,
            unreadable: Vec::new(),
        }
    }

    /// An empty log, as left behind by compaction
    pub fn empty(last_updated: i64) -> Self {
        Self::new(last_updated, Vec::new())
    }

    /// Union `incoming` into the log
    ///
    /// Events whose id is already present are skipped, so retrying a push
    /// that actually landed never duplicates entries. Unreadable entries are
    /// left untouched.
    pub fn merge_events(&mut self, incoming: Vec<Event>) -> usize {
        let mut seen: HashSet<_> = self.events.iter().map(|e| e.id).collect();
        let before = self.events.len();
        self.events
            .extend(incoming.into_iter().filter(|e| seen.insert(e.id)));
        self.events.len() - before
    }
}

/// Full-state baseline written by compaction
///
/// Collections are stored as JSON strings, matching what other clients of
/// the primary record expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Epoch milliseconds when the snapshot was taken
    pub timestamp: i64,
    /// Device that performed the compaction
    #[serde(rename = "deviceId", default)]
    pub device_id: String,
    pub habits: String,
    pub notes: String,
}

/// Identifies one snapshot without its payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotMarker {
    pub timestamp: i64,
    #[serde(rename = "deviceId")]
    pub device_id: String,
}

impl Snapshot {
    /// Serialize the collections into a snapshot
    pub fn capture(
        timestamp: i64,
        device_id: impl Into<String>,
        habits: &[Habit],
        notes: &[Note],
    ) -> RemoteResult<Self> {
        Ok(Self {
            timestamp,
            device_id: device_id.into(),
            habits: serde_json::to_string(habits).map_err(|source| RemoteError::Malformed {
                what: "snapshot habits".to_string(),
                source,
            })?,
            notes: serde_json::to_string(notes).map_err(|source| RemoteError::Malformed {
                what: "snapshot notes".to_string(),
                source,
            })?,
        })
    }

    pub fn marker(&self) -> SnapshotMarker {
        SnapshotMarker {
            timestamp: self.timestamp,
            device_id: self.device_id.clone(),
        }
    }

    /// Decode the stored collections
    pub fn restore(&self) -> RemoteResult<(Vec<Habit>, Vec<Note>)> {
        let habits =
            serde_json::from_str(&self.habits).map_err(|source| RemoteError::Malformed {
                what: "snapshot habits".to_string(),
                source,
            })?;
        let notes = serde_json::from_str(&self.notes).map_err(|source| RemoteError::Malformed {
            what: "snapshot notes".to_string(),
            source,
        })?;
        Ok((habits, notes))
    }
}

/// Document store holding the shared event log and snapshots
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the sync-event record, `None` if the account has none
    async fn get_events(&self, account_id: &str) -> RemoteResult<Option<SyncDocument>>;

    /// Create the sync-event record; fails with `AlreadyExists` if present
    async fn create_events(&self, account_id: &str, doc: SyncDocument) -> RemoteResult<()>;

    /// Atomically union `events` into the record and bump `lastUpdated`
    ///
    /// Fails with `NotFound` if the record does not exist yet.
    async fn append_events(&self, account_id: &str, events: Vec<Event>) -> RemoteResult<()>;

    /// Replace the sync-event record, creating it if needed
    async fn overwrite_events(&self, account_id: &str, doc: SyncDocument) -> RemoteResult<()>;

    /// Store `lastSnapshot` on the primary record, keeping its other fields
    async fn write_snapshot(&self, account_id: &str, snapshot: Snapshot) -> RemoteResult<()>;

    /// Read `lastSnapshot` from the primary record
    async fn get_snapshot(&self, account_id: &str) -> RemoteResult<Option<Snapshot>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EntityRef, EventKind};

    #[test]
    fn test_merge_events_skips_known_ids() {
        let a = Event::with_timestamp(EventKind::HabitDelete(EntityRef { id: 1 }), 1, "d");
        let b = Event::with_timestamp(EventKind::HabitDelete(EntityRef { id: 2 }), 2, "d");

        let mut doc = SyncDocument::new(0, vec![a.clone()]);
        assert_eq!(doc.merge_events(vec![a.clone(), b.clone(), b.clone()]), 1);
        assert_eq!(doc.events, vec![a, b]);
    }

    #[test]
    fn test_sync_document_wire_shape() {
        let doc = SyncDocument::empty(42);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, serde_json::json!({"lastUpdated": 42, "events": []}));

        let parsed: SyncDocument = serde_json::from_str(r#"{"lastUpdated": 5}"#).unwrap();
        assert!(parsed.events.is_empty());
    }

    #[test]
    fn test_unknown_event_types_are_kept_aside() {
        let raw = serde_json::json!({
            "lastUpdated": 7,
            "events": [
                {
                    "id": "6f1c2d4e-8a7b-4c3d-9e2f-1a2b3c4d5e6f",
                    "type": "HABIT_DELETE",
                    "payload": {"id": 1},
                    "ts": 5,
                    "deviceId": "dev_a"
                },
                {
                    "id": "0b6a1c3e-2f4d-4e5a-8b7c-9d0e1f2a3b4c",
                    "type": "HABIT_RENAME",
                    "payload": {"id": 1, "name": "Walk"},
                    "ts": 6,
                    "deviceId": "dev_newer"
                }
            ]
        });

        let mut doc: SyncDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.events.len(), 1);
        assert_eq!(doc.unreadable.len(), 1);
        assert_eq!(doc.unreadable[0]["type"], "HABIT_RENAME");

        let b = Event::with_timestamp(EventKind::HabitDelete(EntityRef { id: 2 }), 8, "d");
        assert_eq!(doc.merge_events(vec![b]), 1);

        let written = serde_json::to_value(&doc).unwrap();
        let events = written["events"].as_array().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().any(|e| e["type"] == "HABIT_RENAME"));
    }

    #[test]
    fn test_snapshot_capture_restore() {
        let habits = vec![Habit::new(1, "Run")];
        let notes = vec![Note::new(2, "Title", "Body")];

        let snapshot = Snapshot::capture(99, "dev_a", &habits, &notes).unwrap();
        assert!(snapshot.habits.starts_with('['));
        assert_eq!(
            snapshot.marker(),
            SnapshotMarker {
                timestamp: 99,
                device_id: "dev_a".to_string()
            }
        );

        let (h, n) = snapshot.restore().unwrap();
        assert_eq!(h, habits);
        assert_eq!(n, notes);
    }

    #[test]
    fn test_snapshot_restore_rejects_garbage() {
        let snapshot = Snapshot {
            timestamp: 1,
            device_id: String::new(),
            habits: "not json".to_string(),
            notes: "[]".to_string(),
        };
        assert!(matches!(
            snapshot.restore(),
            Err(RemoteError::Malformed { .. })
        ));
    }
}
