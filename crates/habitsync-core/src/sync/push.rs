//! Push stage: deliver the pending queue to the remote log

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{account, SyncEngine};
use crate::event::{now_millis, Event};
use crate::remote::{RemoteError, RemoteResult, SyncDocument};

/// Result of a push attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Nothing to push, or no account
    Skipped,
    /// Events appended to an existing remote log
    Pushed(usize),
    /// Remote log created with these events
    Created(usize),
    /// Remote write failed; the queue is kept for the next attempt
    Failed,
}

impl SyncEngine {
    /// Send pending events to the account's remote log
    ///
    /// On success exactly the delivered events leave the queue. On failure
    /// nothing is removed.
    pub async fn push_events(&self, account_id: Option<&str>) -> PushOutcome {
        let Some(account_id) = account(account_id) else {
            debug!("No account, skipping push");
            return PushOutcome::Skipped;
        };

        let pending = self.log.pending();
        if pending.is_empty() {
            return PushOutcome::Skipped;
        }

        let count = pending.len();
        let ids: Vec<Uuid> = pending.iter().map(|e| e.id).collect();

        let outcome = match self.deliver(account_id, pending).await {
            Ok(true) => PushOutcome::Created(count),
            Ok(false) => PushOutcome::Pushed(count),
            Err(e) => {
                warn!("Failed to push {} event(s), will retry: {}", count, e);
                return PushOutcome::Failed;
            }
        };

        // Remote has the events; a failure here only means they are sent again
        if let Err(e) = self.log.acknowledge(&ids) {
            warn!("Pushed events could not be removed from the queue: {}", e);
        }

        info!("Pushed {} event(s) for {}", count, account_id);
        outcome
    }

    /// Append, creating the log on first use; returns whether it was created
    async fn deliver(&self, account_id: &str, events: Vec<Event>) -> RemoteResult<bool> {
        match self.remote.append_events(account_id, events.clone()).await {
            Ok(()) => Ok(false),
            Err(e) if e.is_not_found() => {
                debug!("No sync record for {} yet, creating it", account_id);
                let doc = SyncDocument::new(now_millis(), events.clone());
                match self.remote.create_events(account_id, doc).await {
                    Ok(()) => Ok(true),
                    // Another device created it in between
                    Err(RemoteError::AlreadyExists { .. }) => {
                        self.remote.append_events(account_id, events).await?;
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::event::{EntityRef, EventKind};
    use crate::models::{Habit, Note};
    use crate::remote::{MemoryRemote, RemoteStore};

    #[tokio::test]
    async fn test_first_push_creates_log() {
        let remote = MemoryRemote::new();
        let (_kv, engine) = device(&remote);

        let e1 = engine
            .log_event(EventKind::HabitAdd(Habit::new(1, "Read")))
            .unwrap();
        let e2 = engine
            .log_event(EventKind::HabitDelete(EntityRef { id: 1 }))
            .unwrap();

        assert_eq!(engine.push_events(Some(ACCOUNT)).await, PushOutcome::Created(2));
        assert!(engine.event_log().is_empty());

        let doc = remote.get_events(ACCOUNT).await.unwrap().unwrap();
        assert_eq!(doc.events, vec![e1, e2]);
    }

    #[tokio::test]
    async fn test_push_appends_to_existing_log() {
        let remote = MemoryRemote::new();
        let (_kv_a, a) = device(&remote);
        let (_kv_b, b) = device(&remote);

        a.log_event(EventKind::HabitAdd(Habit::new(1, "Read")))
            .unwrap();
        assert_eq!(a.push_events(Some(ACCOUNT)).await, PushOutcome::Created(1));

        b.log_event(EventKind::HabitAdd(Habit::new(2, "Walk")))
            .unwrap();
        assert_eq!(b.push_events(Some(ACCOUNT)).await, PushOutcome::Pushed(1));

        let doc = remote.get_events(ACCOUNT).await.unwrap().unwrap();
        assert_eq!(doc.events.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_queue_or_no_account_is_skipped() {
        let remote = MemoryRemote::new();
        let (_kv, engine) = device(&remote);

        assert_eq!(engine.push_events(Some(ACCOUNT)).await, PushOutcome::Skipped);

        engine
            .log_event(EventKind::HabitAdd(Habit::new(1, "Read")))
            .unwrap();
        assert_eq!(engine.push_events(None).await, PushOutcome::Skipped);
        assert_eq!(engine.push_events(Some("  ")).await, PushOutcome::Skipped);

        assert_eq!(remote.write_count(), 0);
        assert_eq!(engine.event_log().pending_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_push_keeps_queue() {
        let remote = MemoryRemote::new();
        let (_kv, engine) = device(&remote);
        engine
            .log_event(EventKind::HabitAdd(Habit::new(1, "Read")))
            .unwrap();
        engine
            .log_event(EventKind::NoteAdd(Note::new(2, "Shelf", "")))
            .unwrap();
        let queued = engine.event_log().pending();

        remote.set_available(false);
        assert_eq!(engine.push_events(Some(ACCOUNT)).await, PushOutcome::Failed);
        assert_eq!(engine.event_log().pending(), queued);

        // Retried once connectivity returns
        remote.set_available(true);
        assert_eq!(engine.push_events(Some(ACCOUNT)).await, PushOutcome::Created(2));
        assert!(engine.event_log().is_empty());
    }

    #[tokio::test]
    async fn test_repushed_events_are_not_duplicated() {
        let remote = MemoryRemote::new();
        let (_kv, engine) = device(&remote);
        let event = engine
            .log_event(EventKind::HabitAdd(Habit::new(1, "Read")))
            .unwrap();
        engine.push_events(Some(ACCOUNT)).await;

        // Acknowledgement lost: the same event goes out again
        engine.event_log().append(event).unwrap();
        assert_eq!(engine.push_events(Some(ACCOUNT)).await, PushOutcome::Pushed(1));

        let doc = remote.get_events(ACCOUNT).await.unwrap().unwrap();
        assert_eq!(doc.events.len(), 1);
    }
}
