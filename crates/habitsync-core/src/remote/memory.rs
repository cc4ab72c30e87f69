//! In-process remote store
//!
//! Cloning a [`MemoryRemote`] yields another handle to the same records, so
//! several engines (devices) can share one account log in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{RemoteError, RemoteResult, RemoteStore, Snapshot, SyncDocument};
use crate::event::{now_millis, Event};

#[derive(Debug, Default)]
struct Records {
    sync_events: HashMap<String, SyncDocument>,
    snapshots: HashMap<String, Snapshot>,
}

/// Remote store held in memory
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    records: Arc<Mutex<Records>>,
    available: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self {
            records: Arc::new(Mutex::new(Records::default())),
            available: Arc::new(AtomicBool::new(true)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing or regaining connectivity
    ///
    /// While unavailable every operation fails with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful write operations so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> RemoteResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("memory remote is offline".to_string()))
        }
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn get_events(&self, account_id: &str) -> RemoteResult<Option<SyncDocument>> {
        self.check_available()?;
        let records = self.records.lock().await;
        Ok(records.sync_events.get(account_id).cloned())
    }

    async fn create_events(&self, account_id: &str, doc: SyncDocument) -> RemoteResult<()> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        if records.sync_events.contains_key(account_id) {
            return Err(RemoteError::AlreadyExists {
                account: account_id.to_string(),
            });
        }
        records.sync_events.insert(account_id.to_string(), doc);
        self.record_write();
        Ok(())
    }

    async fn append_events(&self, account_id: &str, events: Vec<Event>) -> RemoteResult<()> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        let doc = records
            .sync_events
            .get_mut(account_id)
            .ok_or_else(|| RemoteError::NotFound {
                account: account_id.to_string(),
            })?;
        doc.merge_events(events);
        doc.last_updated = now_millis();
        self.record_write();
        Ok(())
    }

    async fn overwrite_events(&self, account_id: &str, doc: SyncDocument) -> RemoteResult<()> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        records.sync_events.insert(account_id.to_string(), doc);
        self.record_write();
        Ok(())
    }

    async fn write_snapshot(&self, account_id: &str, snapshot: Snapshot) -> RemoteResult<()> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        records.snapshots.insert(account_id.to_string(), snapshot);
        self.record_write();
        Ok(())
    }

    async fn get_snapshot(&self, account_id: &str) -> RemoteResult<Option<Snapshot>> {
        self.check_available()?;
        let records = self.records.lock().await;
        Ok(records.snapshots.get(account_id).cloned())
    }
}
