//! Snapshot stage: compact the remote log
//!
//! Writes the full local state to the account record as `lastSnapshot` and
//! replaces the event log with an empty one. Runs at most once per
//! snapshot interval per device.

use tracing::{debug, info, warn};

use super::{account, SyncEngine, SyncError};
use crate::event::now_millis;
use crate::models::{Habit, Note};
use crate::remote::{Snapshot, SyncDocument};

/// Result of a snapshot attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// No account
    Skipped,
    /// The previous snapshot is too recent
    CoolingDown { next_eligible_at: i64 },
    /// Snapshot written and log compacted
    Completed { timestamp: i64 },
    /// A remote or local write failed; the marker is unchanged
    Failed,
}

impl SyncEngine {
    /// Compact the remote log if the interval has elapsed
    pub async fn perform_snapshot(
        &self,
        account_id: Option<&str>,
        habits: &[Habit],
        notes: &[Note],
    ) -> SnapshotOutcome {
        let Some(account_id) = account(account_id) else {
            return SnapshotOutcome::Skipped;
        };

        let now = now_millis();
        let last = self.state.last_snapshot();
        let interval = i64::try_from(self.snapshot_interval.as_millis()).unwrap_or(i64::MAX);
        let next_eligible_at = last.saturating_add(interval);
        if now < next_eligible_at {
            debug!("Snapshot cooling down until {}", next_eligible_at);
            return SnapshotOutcome::CoolingDown { next_eligible_at };
        }

        match self.compact(account_id, now, habits, notes).await {
            Ok(()) => {
                info!(
                    "Compacted remote log for {} ({} habits, {} notes)",
                    account_id,
                    habits.len(),
                    notes.len()
                );
                SnapshotOutcome::Completed { timestamp: now }
            }
            Err(e) => {
                warn!("Snapshot failed, will retry next cycle: {}", e);
                SnapshotOutcome::Failed
            }
        }
    }

    async fn compact(
        &self,
        account_id: &str,
        now: i64,
        habits: &[Habit],
        notes: &[Note],
    ) -> Result<(), SyncError> {
        let snapshot = Snapshot::capture(now, self.device_id(), habits, notes)?;
        let marker = snapshot.marker();

        self.remote.write_snapshot(account_id, snapshot).await?;
        self.remote
            .overwrite_events(account_id, SyncDocument::empty(now))
            .await?;

        self.state.set_last_snapshot(now)?;
        self.state.set_seen_snapshot(&marker)?;
        Ok(())
    }
}
