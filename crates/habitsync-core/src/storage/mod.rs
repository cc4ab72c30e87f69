//! Local storage layer
//!
//! Every piece of device-local state (pending queue, sync checkpoint,
//! device id, snapshot marker, materialized collections) lives behind the
//! synchronous [`KeyValueStore`] interface, keyed by string.
//!
//! - [`MemoryKv`]: in-process map, for tests and embedding
//! - [`FileKv`]: one file per key under a directory, written atomically
//!
//! Values are JSON text. A value that fails to parse is treated as absent:
//! corrupt local state never crashes the caller.

mod error;
mod memory;
mod persistence;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryKv;
pub use persistence::FileKv;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Synchronous string-keyed persistence
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Read and decode a JSON value
///
/// Returns `None` when the key is missing, unreadable or holds malformed
/// JSON. Failures are logged.
pub fn read_json<T: DeserializeOwned>(kv: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read local key {}: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring malformed local value for {}: {}", key, e);
            None
        }
    }
}

/// Encode and store a JSON value
pub fn write_json<T: Serialize + ?Sized>(
    kv: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    kv.set(key, &raw)
}
