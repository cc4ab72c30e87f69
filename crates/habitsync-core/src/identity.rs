//! Device identity
//!
//! Every installation gets a stable identifier the first time it is asked
//! for one. The id is stamped on each event the device creates and is
//! never regenerated unless local storage is wiped.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::now_millis;
use crate::storage::KeyValueStore;

/// Local storage key holding the device id
pub const DEVICE_ID_KEY: &str = "device_id";

/// Length of the random suffix
const SUFFIX_LEN: usize = 9;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identity manager for this installation
#[derive(Clone)]
pub struct Identity {
    kv: Arc<dyn KeyValueStore>,
}

impl Identity {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Check if a device id has already been assigned
    pub fn is_initialized(&self) -> bool {
        matches!(self.kv.get(DEVICE_ID_KEY), Ok(Some(id)) if !id.trim().is_empty())
    }

    /// Get the device id, generating and persisting one on first use
    ///
    /// Never fails: if the new id cannot be persisted it is still returned,
    /// and a later call will try again.
    pub fn device_id(&self) -> String {
        match self.kv.get(DEVICE_ID_KEY) {
            Ok(Some(id)) if !id.trim().is_empty() => return id.trim().to_string(),
            Ok(_) => {}
            Err(e) => warn!("Failed to read device id: {}", e),
        }

        let id = generate_device_id();
        match self.kv.set(DEVICE_ID_KEY, &id) {
            Ok(()) => debug!("Assigned device id {}", id),
            Err(e) => warn!("Failed to persist device id {}: {}", id, e),
        }
        id
    }
}

/// Build a new `dev_<millis>_<suffix>` identifier
pub fn generate_device_id() -> String {
    let random = Uuid::new_v4().as_u128();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|i| BASE36[((random >> (i * 6)) % 36) as usize] as char)
        .collect();
    format!("dev_{}_{}", now_millis(), suffix)
}
