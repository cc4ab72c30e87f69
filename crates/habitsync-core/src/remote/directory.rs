//! Remote store backed by a shared directory
//!
//! Lets devices sync through any folder they all see: a network mount or a
//! directory replicated by a file-sync tool.
//!
//! Layout:
//! - `sync_events/<account>.json` - the account's [`SyncDocument`]
//! - `users/<account>.json` - the primary record; only `lastSnapshot` is
//!   touched here, other fields are preserved
//!
//! Writes go to a temp file that is then renamed over the target. Appends
//! are read-modify-write within this process; two devices appending at the
//! same instant through a replicated folder can still race, which is the
//! file-sync tool's conflict to resolve.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{RemoteError, RemoteResult, RemoteStore, Snapshot, SyncDocument};
use crate::event::{now_millis, Event};

const SYNC_EVENTS_DIR: &str = "sync_events";
const USERS_DIR: &str = "users";
const SNAPSHOT_FIELD: &str = "lastSnapshot";

/// Remote store writing JSON records under a root directory
#[derive(Debug)]
pub struct DirectoryRemote {
    root: PathBuf,
    // Serializes read-modify-write cycles from this process
    write_lock: Mutex<()>,
}

impl DirectoryRemote {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn events_path(&self, account_id: &str) -> RemoteResult<PathBuf> {
        validate_account(account_id)?;
        Ok(self
            .root
            .join(SYNC_EVENTS_DIR)
            .join(format!("{}.json", account_id)))
    }

    fn user_path(&self, account_id: &str) -> RemoteResult<PathBuf> {
        validate_account(account_id)?;
        Ok(self.root.join(USERS_DIR).join(format!("{}.json", account_id)))
    }
}

#[async_trait]
impl RemoteStore for DirectoryRemote {
    async fn get_events(&self, account_id: &str) -> RemoteResult<Option<SyncDocument>> {
        let path = self.events_path(account_id)?;
        read_record(&path).await
    }

    async fn create_events(&self, account_id: &str, doc: SyncDocument) -> RemoteResult<()> {
        let path = self.events_path(account_id)?;
        let _guard = self.write_lock.lock().await;

        if fs::try_exists(&path).await.map_err(|source| RemoteError::Io {
            path: path.clone(),
            source,
        })? {
            return Err(RemoteError::AlreadyExists {
                account: account_id.to_string(),
            });
        }
        write_record(&path, &doc).await
    }

    async fn append_events(&self, account_id: &str, events: Vec<Event>) -> RemoteResult<()> {
        let path = self.events_path(account_id)?;
        let _guard = self.write_lock.lock().await;

        let mut doc: SyncDocument =
            read_record(&path)
                .await?
                .ok_or_else(|| RemoteError::NotFound {
                    account: account_id.to_string(),
                })?;
        let added = doc.merge_events(events);
        doc.last_updated = now_millis();
        debug!("Appending {} event(s) to {:?}", added, path);
        write_record(&path, &doc).await
    }

    async fn overwrite_events(&self, account_id: &str, doc: SyncDocument) -> RemoteResult<()> {
        let path = self.events_path(account_id)?;
        let _guard = self.write_lock.lock().await;
        write_record(&path, &doc).await
    }

    async fn write_snapshot(&self, account_id: &str, snapshot: Snapshot) -> RemoteResult<()> {
        let path = self.user_path(account_id)?;
        let _guard = self.write_lock.lock().await;

        let mut record: Map<String, Value> = read_record(&path).await?.unwrap_or_default();
        let value = serde_json::to_value(&snapshot).map_err(|source| RemoteError::Malformed {
            what: path.display().to_string(),
            source,
        })?;
        record.insert(SNAPSHOT_FIELD.to_string(), value);
        write_record(&path, &record).await
    }

    async fn get_snapshot(&self, account_id: &str) -> RemoteResult<Option<Snapshot>> {
        let path = self.user_path(account_id)?;
        let Some(mut record) = read_record::<Map<String, Value>>(&path).await? else {
            return Ok(None);
        };

        match record.remove(SNAPSHOT_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| RemoteError::Malformed {
                    what: format!("{} ({})", path.display(), SNAPSHOT_FIELD),
                    source,
                }),
        }
    }
}

/// Account ids become file names
fn validate_account(account_id: &str) -> RemoteResult<()> {
    let valid = !account_id.is_empty()
        && !account_id.starts_with('.')
        && account_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'));
    if valid {
        Ok(())
    } else {
        Err(RemoteError::InvalidAccount(account_id.to_string()))
    }
}

async fn read_record<T: DeserializeOwned>(path: &Path) -> RemoteResult<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(RemoteError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| RemoteError::Malformed {
            what: path.display().to_string(),
            source,
        })
}

async fn write_record<T: Serialize + ?Sized>(path: &Path, value: &T) -> RemoteResult<()> {
    let io_err = |source: io::Error| RemoteError::Io {
        path: path.to_path_buf(),
        source,
    };

    let bytes = serde_json::to_vec_pretty(value).map_err(|source| RemoteError::Malformed {
        what: path.display().to_string(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &bytes).await.map_err(io_err)?;
    fs::rename(&temp_path, path).await.map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EntityRef, EventKind};
    use crate::models::{Habit, Note};
    use tempfile::TempDir;

    fn event(id: u64, ts: i64) -> Event {
        Event::with_timestamp(EventKind::HabitDelete(EntityRef { id }), ts, "dev")
    }

    #[tokio::test]
    async fn test_missing_account_reads_none() {
        let temp_dir = TempDir::new().unwrap();
        let remote = DirectoryRemote::new(temp_dir.path());

        assert!(remote.get_events("acct").await.unwrap().is_none());
        assert!(remote.get_snapshot("acct").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_not_found_then_create() {
        let temp_dir = TempDir::new().unwrap();
        let remote = DirectoryRemote::new(temp_dir.path());

        let err = remote.append_events("acct", vec![event(1, 1)]).await.unwrap_err();
        assert!(err.is_not_found());

        remote
            .create_events("acct", SyncDocument::new(1, vec![event(1, 1)]))
            .await
            .unwrap();
        remote.append_events("acct", vec![event(2, 2)]).await.unwrap();

        let doc = remote.get_events("acct").await.unwrap().unwrap();
        assert_eq!(doc.events.len(), 2);
        assert!(temp_dir.path().join("sync_events").join("acct.json").exists());
    }

    #[tokio::test]
    async fn test_create_existing_fails() {
        let temp_dir = TempDir::new().unwrap();
        let remote = DirectoryRemote::new(temp_dir.path());

        remote.create_events("acct", SyncDocument::empty(0)).await.unwrap();
        let err = remote
            .create_events("acct", SyncDocument::empty(0))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_overwrite_resets_log() {
        let temp_dir = TempDir::new().unwrap();
        let remote = DirectoryRemote::new(temp_dir.path());

        remote
            .create_events("acct", SyncDocument::new(1, vec![event(1, 1)]))
            .await
            .unwrap();
        remote
            .overwrite_events("acct", SyncDocument::empty(5))
            .await
            .unwrap();

        let doc = remote.get_events("acct").await.unwrap().unwrap();
        assert!(doc.events.is_empty());
        assert_eq!(doc.last_updated, 5);
    }

    #[tokio::test]
    async fn test_snapshot_preserves_other_profile_fields() {
        let temp_dir = TempDir::new().unwrap();
        let remote = DirectoryRemote::new(temp_dir.path());

        let users = temp_dir.path().join("users");
        std::fs::create_dir_all(&users).unwrap();
        std::fs::write(
            users.join("acct.json"),
            r#"{"email": "someone@example.com", "licensed": true}"#,
        )
        .unwrap();

        let snapshot =
            Snapshot::capture(77, "dev_x", &[Habit::new(1, "Run")], &[Note::new(2, "a", "b")])
                .unwrap();
        remote.write_snapshot("acct", snapshot.clone()).await.unwrap();

        assert_eq!(remote.get_snapshot("acct").await.unwrap(), Some(snapshot));

        let raw: Value =
            serde_json::from_slice(&std::fs::read(users.join("acct.json")).unwrap()).unwrap();
        assert_eq!(raw["email"], "someone@example.com");
        assert_eq!(raw["lastSnapshot"]["timestamp"], 77);
    }

    #[tokio::test]
    async fn test_malformed_record_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let remote = DirectoryRemote::new(temp_dir.path());

        let dir = temp_dir.path().join("sync_events");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("acct.json"), "{ truncated").unwrap();

        assert!(matches!(
            remote.get_events("acct").await,
            Err(RemoteError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_unsafe_account_ids() {
        let temp_dir = TempDir::new().unwrap();
        let remote = DirectoryRemote::new(temp_dir.path());

        for account in ["", "../other", "a/b", ".hidden"] {
            assert!(matches!(
                remote.get_events(account).await,
                Err(RemoteError::InvalidAccount(_))
            ));
        }
    }
}
