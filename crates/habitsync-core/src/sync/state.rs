//! Sync state persistence
//!
//! Device-local watermarks that survive between sessions:
//! - the sync checkpoint: timestamp of the newest remote event applied
//! - the snapshot marker: when this device last compacted the remote log
//! - the seen snapshot: the last remote snapshot folded into local state

use std::sync::Arc;

use crate::remote::SnapshotMarker;
use crate::storage::{read_json, write_json, KeyValueStore, StorageResult};

/// Local storage key of the sync checkpoint
pub const LAST_SYNC_TIME_KEY: &str = "last_sync_time";

/// Local storage key of the snapshot marker
pub const LAST_SNAPSHOT_KEY: &str = "last_snapshot";

/// Local storage key of the last snapshot this device has seen
pub const SEEN_SNAPSHOT_KEY: &str = "seen_snapshot";

/// Persistent sync watermarks
#[derive(Clone)]
pub struct SyncState {
    kv: Arc<dyn KeyValueStore>,
}

impl SyncState {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Current checkpoint; 0 if never synced or unreadable
    pub fn checkpoint(&self) -> i64 {
        read_json(self.kv.as_ref(), LAST_SYNC_TIME_KEY).unwrap_or(0)
    }

    /// Move the checkpoint forward
    ///
    /// The checkpoint never decreases: a `timestamp` older than the stored
    /// value leaves it unchanged. Returns the checkpoint now in effect.
    pub fn advance_checkpoint(&self, timestamp: i64) -> StorageResult<i64> {
        let current = self.checkpoint();
        if timestamp <= current {
            return Ok(current);
        }
        write_json(self.kv.as_ref(), LAST_SYNC_TIME_KEY, &timestamp)?;
        Ok(timestamp)
    }

    /// When this device last compacted; 0 if never
    pub fn last_snapshot(&self) -> i64 {
        read_json(self.kv.as_ref(), LAST_SNAPSHOT_KEY).unwrap_or(0)
    }

    pub fn set_last_snapshot(&self, timestamp: i64) -> StorageResult<()> {
        write_json(self.kv.as_ref(), LAST_SNAPSHOT_KEY, &timestamp)
    }

    /// Last remote snapshot restored or written by this device
    pub fn seen_snapshot(&self) -> Option<SnapshotMarker> {
        read_json(self.kv.as_ref(), SEEN_SNAPSHOT_KEY)
    }

    pub fn set_seen_snapshot(&self, marker: &SnapshotMarker) -> StorageResult<()> {
        write_json(self.kv.as_ref(), SEEN_SNAPSHOT_KEY, marker)
    }

    /// Forget all watermarks
    ///
    /// The next pull restores the remote snapshot, if any, and replays the
    /// whole remote log.
    pub fn reset(&self) -> StorageResult<()> {
        self.kv.remove(LAST_SYNC_TIME_KEY)?;
        self.kv.remove(LAST_SNAPSHOT_KEY)?;
        self.kv.remove(SEEN_SNAPSHOT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKv;

    fn state() -> (Arc<MemoryKv>, SyncState) {
        let kv = Arc::new(MemoryKv::new());
        (kv.clone(), SyncState::new(kv))
    }

    #[test]
    fn test_defaults_to_zero() {
        let (_kv, state) = state();
        assert_eq!(state.checkpoint(), 0);
        assert_eq!(state.last_snapshot(), 0);
    }

    #[test]
    fn test_checkpoint_is_monotonic() {
        let (_kv, state) = state();
        assert_eq!(state.advance_checkpoint(150).unwrap(), 150);
        assert_eq!(state.advance_checkpoint(100).unwrap(), 150);
        assert_eq!(state.checkpoint(), 150);
        assert_eq!(state.advance_checkpoint(151).unwrap(), 151);
    }

    #[test]
    fn test_reads_plain_integer_values() {
        let (kv, state) = state();
        kv.set(LAST_SYNC_TIME_KEY, "1700000000000").unwrap();
        assert_eq!(state.checkpoint(), 1_700_000_000_000);
    }

    #[test]
    fn test_corrupt_values_read_as_zero() {
        let (kv, state) = state();
        kv.set(LAST_SYNC_TIME_KEY, "yesterday").unwrap();
        kv.set(LAST_SNAPSHOT_KEY, "{").unwrap();
        assert_eq!(state.checkpoint(), 0);
        assert_eq!(state.last_snapshot(), 0);
    }

    #[test]
    fn test_reset() {
        let (_kv, state) = state();
        state.advance_checkpoint(10).unwrap();
        state.set_last_snapshot(20).unwrap();
        state
            .set_seen_snapshot(&SnapshotMarker {
                timestamp: 20,
                device_id: "dev_a".to_string(),
            })
            .unwrap();

        state.reset().unwrap();
        assert_eq!(state.checkpoint(), 0);
        assert_eq!(state.last_snapshot(), 0);
        assert!(state.seen_snapshot().is_none());
    }
}
