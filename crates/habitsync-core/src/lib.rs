//! HabitSync Core Library
//!
//! This crate provides the core functionality for HabitSync, an
//! offline-first habit tracker and notebook that syncs between devices
//! through a shared event log.
//!
//! # Architecture
//!
//! - **Event log**: every local mutation is queued as an immutable event
//! - **Remote store**: one append-only event log per account, compacted
//!   periodically into a snapshot
//! - **Replay**: devices converge by replaying events in timestamp order
//!
//! # Quick Start
//!
//! ```text
//! let mut store = Store::open()?;
//!
//! // Add a habit and check today
//! let habit = store.add_habit("Stretch")?;
//! store.toggle_habit(habit.id, None, true)?;
//!
//! // Sync with other devices
//! let engine = store.engine(Arc::new(DirectoryRemote::new("/mnt/shared")));
//! let report = store.sync(&engine).await?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `models`: Habits and notes
//! - `event`: Event records and their wire format
//! - `event_log`: Pending event queue
//! - `identity`: Device identity
//! - `remote`: Remote event store trait and implementations
//! - `sync`: Push, pull/merge and snapshot pipelines
//! - `storage`: Local key-value persistence
//! - `config`: Application configuration

pub mod config;
pub mod event;
pub mod event_log;
pub mod identity;
pub mod models;
pub mod remote;
pub mod storage;
pub mod store;
pub mod sync;

pub use config::Config;
pub use event::{Event, EventKind};
pub use event_log::EventLog;
pub use identity::Identity;
pub use models::{EntityId, Habit, Note};
pub use remote::{DirectoryRemote, MemoryRemote, RemoteError, RemoteStore};
pub use storage::{FileKv, KeyValueStore, MemoryKv, StorageError};
pub use store::{Store, StoreError};
pub use sync::{PushOutcome, SnapshotOutcome, SyncEngine, SyncReport};
