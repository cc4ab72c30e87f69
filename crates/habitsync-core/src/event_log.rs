//! Local pending event queue
//!
//! Events created on this device wait here until a push to the remote
//! store is confirmed. The queue is stored as one JSON array; each append
//! is an independent read-append-write, so a tight loop of appends never
//! drops entries.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::event::{Event, EventKind};
use crate::identity::Identity;
use crate::storage::{read_json, write_json, KeyValueStore, StorageResult};

/// Local storage key holding the pending queue
pub const PENDING_EVENTS_KEY: &str = "pending_events";

/// Append-only queue of unacknowledged local events
#[derive(Clone)]
pub struct EventLog {
    kv: Arc<dyn KeyValueStore>,
    identity: Identity,
}

impl EventLog {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let identity = Identity::new(kv.clone());
        Self { kv, identity }
    }

    /// Record a mutation
    ///
    /// Builds the event with a fresh id, the current time and this device's
    /// id, appends it to the pending queue and returns it.
    pub fn log_event(&self, kind: EventKind) -> StorageResult<Event> {
        let event = Event::new(kind, self.identity.device_id());
        self.append(event.clone())?;
        Ok(event)
    }

    /// Append an already constructed event
    pub fn append(&self, event: Event) -> StorageResult<()> {
        let mut pending = self.pending();
        debug!(
            "Queueing {} event {} for entity {}",
            event.kind.name(),
            event.id,
            event.kind.target_id()
        );
        pending.push(event);
        write_json(self.kv.as_ref(), PENDING_EVENTS_KEY, &pending)
    }

    /// Events not yet confirmed pushed, in creation order
    ///
    /// A missing or corrupt queue reads as empty.
    pub fn pending(&self) -> Vec<Event> {
        read_json(self.kv.as_ref(), PENDING_EVENTS_KEY).unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    /// Remove events the remote store has accepted
    ///
    /// Only the given ids are removed; events queued while a push was in
    /// flight stay pending. Returns how many were removed.
    pub fn acknowledge(&self, ids: &[Uuid]) -> StorageResult<usize> {
        let mut pending = self.pending();
        let before = pending.len();
        pending.retain(|e| !ids.contains(&e.id));
        let removed = before - pending.len();
        if removed > 0 {
            write_json(self.kv.as_ref(), PENDING_EVENTS_KEY, &pending)?;
        }
        Ok(removed)
    }

    /// Drop all pending events
    pub fn clear(&self) -> StorageResult<()> {
        write_json(self.kv.as_ref(), PENDING_EVENTS_KEY, &Vec::<Event>::new())
    }

    /// Id of the device events are stamped with
    pub fn device_id(&self) -> String {
        self.identity.device_id()
    }
}
