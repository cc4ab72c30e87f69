//! Pull stage: merge remote events into local state
//!
//! Normally only events newer than the checkpoint are replayed onto the
//! caller's collections. When another device has compacted the log since
//! this device last looked, events it never read may be gone; the remote
//! snapshot then becomes the baseline, and the whole remaining log plus the
//! local pending queue is replayed over it.

use tracing::{debug, info, warn};

use super::merge::{sort_for_replay, Collections};
use super::{account, SyncEngine, SyncError};
use crate::event::Event;
use crate::models::{Habit, Note};

/// New local state produced by a pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub habits: Vec<Habit>,
    pub notes: Vec<Note>,
    /// Events replayed
    pub applied: usize,
    /// Checkpoint after the pull
    pub checkpoint: i64,
    /// Timestamp of the snapshot used as baseline, if one was restored
    pub restored_snapshot: Option<i64>,
}

impl Merged {
    pub fn into_collections(self) -> Collections {
        Collections::new(self.habits, self.notes)
    }
}

impl SyncEngine {
    /// Fetch and merge remote events
    ///
    /// Returns `None` when there is no account, nothing new, or the pull
    /// failed. A failed pull never moves the checkpoint.
    pub async fn pull_events(
        &self,
        account_id: Option<&str>,
        habits: &[Habit],
        notes: &[Note],
    ) -> Option<Merged> {
        match self.try_pull(account_id, habits, notes).await {
            Ok(merged) => merged,
            Err(e) => {
                warn!("Pull failed, keeping local state: {}", e);
                None
            }
        }
    }

    pub(crate) async fn try_pull(
        &self,
        account_id: Option<&str>,
        habits: &[Habit],
        notes: &[Note],
    ) -> Result<Option<Merged>, SyncError> {
        let Some(account_id) = account(account_id) else {
            debug!("No account, skipping pull");
            return Ok(None);
        };

        let checkpoint = self.state.checkpoint();
        let doc = self.remote.get_events(account_id).await?;
        let seen = self.state.seen_snapshot();
        let snapshot = self
            .remote
            .get_snapshot(account_id)
            .await?
            .filter(|s| seen.as_ref() != Some(&s.marker()));

        let remote_events = match (doc, &snapshot) {
            (Some(doc), _) => doc.events,
            (None, Some(_)) => Vec::new(),
            (None, None) => {
                debug!("No remote log for {}", account_id);
                return Ok(None);
            }
        };

        let (mut state, mut batch, target) = match &snapshot {
            Some(snapshot) => {
                let (habits, notes) = snapshot.restore()?;
                info!(
                    "Restoring snapshot from {} taken at {}",
                    snapshot.device_id, snapshot.timestamp
                );
                let target = newest(&remote_events).max(snapshot.timestamp);
                let mut batch = remote_events;
                batch.extend(self.log.pending());
                (Collections::new(habits, notes), batch, target)
            }
            None => {
                let batch: Vec<Event> = remote_events
                    .into_iter()
                    .filter(|e| e.timestamp > checkpoint)
                    .collect();
                if batch.is_empty() {
                    debug!("No remote events after {}", checkpoint);
                    return Ok(None);
                }
                let target = newest(&batch);
                (
                    Collections::new(habits.to_vec(), notes.to_vec()),
                    batch,
                    target,
                )
            }
        };

        sort_for_replay(&mut batch);
        state.apply_all(&batch);

        let checkpoint = self.state.advance_checkpoint(target)?;
        if let Some(snapshot) = &snapshot {
            self.state.set_seen_snapshot(&snapshot.marker())?;
        }

        info!(
            "Merged {} event(s) for {}, checkpoint now {}",
            batch.len(),
            account_id,
            checkpoint
        );

        Ok(Some(Merged {
            habits: state.habits,
            notes: state.notes,
            applied: batch.len(),
            checkpoint,
            restored_snapshot: snapshot.map(|s| s.timestamp),
        }))
    }
}

fn newest(events: &[Event]) -> i64 {
    events.iter().map(|e| e.timestamp).max().unwrap_or(0)
}
