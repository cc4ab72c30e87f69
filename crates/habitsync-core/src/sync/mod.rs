//! Offline-first sync engine
//!
//! Local mutations are queued as events; sync reconciles the queue with a
//! shared per-account event log held by a [`RemoteStore`].
//!
//! ## Cycle
//!
//! 1. **Push**: append the pending queue to the remote log, then drop the
//!    acknowledged events locally
//! 2. **Pull**: fetch remote events newer than the checkpoint, replay them
//!    in timestamp order onto the local collections, advance the checkpoint.
//!    A snapshot written by another device since the last pull replaces the
//!    local baseline first
//! 3. **Snapshot**: at most once per interval, store the full state on the
//!    account record and empty the remote log
//!
//! Sync is best effort. None of the stages return errors to the caller;
//! failures are logged and leave local state untouched so the next cycle
//! retries.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncEngine::new(kv, Arc::new(MemoryRemote::new()));
//! engine.log_event(EventKind::HabitAdd(habit))?;
//! let report = engine.sync_cycle(Some("account"), &habits, &notes).await;
//! ```

mod merge;
mod pull;
mod push;
mod snapshot;
mod state;

pub use merge::{replay, sort_for_replay, Collections};
pub use pull::Merged;
pub use push::PushOutcome;
pub use snapshot::SnapshotOutcome;
pub use state::{SyncState, LAST_SNAPSHOT_KEY, LAST_SYNC_TIME_KEY, SEEN_SNAPSHOT_KEY};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::config::DEFAULT_SNAPSHOT_INTERVAL_HOURS;
use crate::event::{Event, EventKind};
use crate::event_log::EventLog;
use crate::models::{Habit, Note};
use crate::remote::{RemoteError, RemoteStore};
use crate::storage::{KeyValueStore, StorageError, StorageResult};

/// Failure inside a sync stage
///
/// Only surfaces through logs and outcome values.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What one sync cycle did
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub push: PushOutcome,
    /// Merged state, if the pull had anything to apply
    pub merged: Option<Merged>,
    /// Whether the pull stage failed (as opposed to having nothing new)
    pub pull_failed: bool,
    pub snapshot: SnapshotOutcome,
}

impl SyncReport {
    /// True if any stage failed this cycle
    pub fn has_failures(&self) -> bool {
        self.pull_failed
            || matches!(self.push, PushOutcome::Failed)
            || matches!(self.snapshot, SnapshotOutcome::Failed)
    }
}

/// Sync engine for one device
pub struct SyncEngine {
    log: EventLog,
    state: SyncState,
    remote: Arc<dyn RemoteStore>,
    snapshot_interval: Duration,
}

impl SyncEngine {
    /// Create an engine over local storage and a remote store
    pub fn new(kv: Arc<dyn KeyValueStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            log: EventLog::new(kv.clone()),
            state: SyncState::new(kv),
            remote,
            snapshot_interval: Duration::from_secs(DEFAULT_SNAPSHOT_INTERVAL_HOURS * 60 * 60),
        }
    }

    /// Override the compaction cooldown
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Id of this device
    pub fn device_id(&self) -> String {
        self.log.device_id()
    }

    /// Queue a local mutation for the next push
    pub fn log_event(&self, kind: EventKind) -> StorageResult<Event> {
        self.log.log_event(kind)
    }

    /// Run push, pull and snapshot in sequence
    ///
    /// The snapshot runs over the merged state when the pull produced one.
    /// It is skipped entirely when the pull failed, so a log this device
    /// could not read is never compacted away.
    pub async fn sync_cycle(
        &self,
        account_id: Option<&str>,
        habits: &[Habit],
        notes: &[Note],
    ) -> SyncReport {
        let push = self.push_events(account_id).await;

        let (merged, pull_failed) = match self.try_pull(account_id, habits, notes).await {
            Ok(merged) => (merged, false),
            Err(e) => {
                tracing::warn!("Pull failed, keeping local state: {}", e);
                (None, true)
            }
        };

        let snapshot = if pull_failed {
            SnapshotOutcome::Skipped
        } else {
            let (habits, notes) = match &merged {
                Some(m) => (m.habits.as_slice(), m.notes.as_slice()),
                None => (habits, notes),
            };
            self.perform_snapshot(account_id, habits, notes).await
        };

        info!(
            "Sync cycle finished: push={:?}, merged={}, snapshot={:?}",
            push,
            merged.is_some(),
            snapshot
        );

        SyncReport {
            push,
            merged,
            pull_failed,
            snapshot,
        }
    }
}

/// Treat a missing or blank account id as "not signed in"
fn account(account_id: Option<&str>) -> Option<&str> {
    account_id.map(str::trim).filter(|id| !id.is_empty())
}
