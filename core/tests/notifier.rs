//! Drives `notify_core::Notifier` through its public `run()` loop against
//! in-memory fakes for the ledger and subscription repositories, and a
//! worker spawner that records what it was handed instead of actually
//! delivering anything (delivery/retry behavior already has its own
//! coverage in `worker.rs`).
//!
//! Every assertion here is sequenced by awaiting a dedicated observation
//! channel rather than sleeping, since the Notifier is a single-threaded
//! event loop: once an effect (a dispatch, a cursor update, a ledger
//! deletion) has been observed, every synchronous step that produced it has
//! already completed.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use notify_core::error::RepositoryError;
use notify_core::model::{NewSubscription, Subscription};
use notify_core::ports::{LedgerRepository, SubscriptionRepository};
use notify_core::{shutdown_channel, Completion, Notifier, ShutdownHandle, SubscriptionEvent, WorkItem, WorkerSpawner};
use notify_proto::{ChangeLogEntry, ChangeLogEntryId, DataSourceId, EntityId, ObjectType, SubscriptionId};

struct FakeLedgerRepo {
    backlog: Mutex<Vec<ChangeLogEntry>>,
    deleted_tx: mpsc::Sender<i64>,
}

#[async_trait]
impl LedgerRepository for FakeLedgerRepo {
    async fn load_since(&self, after: i64) -> Result<Vec<ChangeLogEntry>, RepositoryError> {
        Ok(self.backlog.lock().unwrap().iter().filter(|e| e.sequence_id.unwrap() > after).cloned().collect())
    }

    async fn tail_sequence_id(&self) -> Result<i64, RepositoryError> {
        Ok(self.backlog.lock().unwrap().iter().filter_map(|e| e.sequence_id).max().unwrap_or(0))
    }

    async fn delete_if_safe(&self, sequence_id: i64, min_cursor: i64) -> Result<bool, RepositoryError> {
        if min_cursor >= sequence_id {
            let _ = self.deleted_tx.send(sequence_id).await;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

struct FakeSubscriptionRepo {
    subs: Mutex<Vec<Subscription>>,
    cursor_tx: mpsc::Sender<(SubscriptionId, i64)>,
}

#[async_trait]
impl SubscriptionRepository for FakeSubscriptionRepo {
    async fn create(&self, new_sub: NewSubscription, initial_cursor: i64) -> Result<Subscription, RepositoryError> {
        let sub = Subscription {
            id: SubscriptionId::new(),
            consumer_id: new_sub.consumer_id,
            callback: new_sub.callback,
            filter: new_sub.filter,
            event_cursor: initial_cursor,
            created_at: Utc::now(),
        };
        self.subs.lock().unwrap().push(sub.clone());
        Ok(sub)
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>, RepositoryError> {
        Ok(self.subs.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Subscription>, RepositoryError> { Ok(self.subs.lock().unwrap().clone()) }

    async fn delete(&self, id: SubscriptionId) -> Result<(), RepositoryError> {
        self.subs.lock().unwrap().retain(|s| s.id != id);
        Ok(())
    }

    async fn update_cursor(&self, id: SubscriptionId, cursor: i64) -> Result<(), RepositoryError> {
        if let Some(s) = self.subs.lock().unwrap().iter_mut().find(|s| s.id == id) {
            s.event_cursor = cursor;
        }
        let _ = self.cursor_tx.send((id, cursor)).await;
        Ok(())
    }
}

/// Stands in for `TokioWorkerSpawner`: instead of delivering over HTTP, the
/// spawned task records the `WorkItem` it was handed and, if `auto_complete`
/// is set, immediately reports it as a completion — mirroring a worker whose
/// first delivery attempt succeeds.
struct RecordingSpawner {
    spawned_tx: mpsc::Sender<SubscriptionId>,
    dispatched_tx: mpsc::Sender<(SubscriptionId, i64)>,
    removed_tx: mpsc::Sender<SubscriptionId>,
    auto_complete: bool,
}

impl WorkerSpawner for RecordingSpawner {
    fn spawn(&self, subscription: &Subscription, completions: mpsc::Sender<Completion>) -> (mpsc::Sender<WorkItem>, ShutdownHandle) {
        let (tx, mut rx) = mpsc::channel::<WorkItem>(16);
        let (handle, mut shutdown) = shutdown_channel();
        let dispatched_tx = self.dispatched_tx.clone();
        let removed_tx = self.removed_tx.clone();
        let subscription_id = subscription.id;
        let auto_complete = self.auto_complete;
        let _ = self.spawned_tx.try_send(subscription_id);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.triggered() => {
                        let _ = removed_tx.send(subscription_id).await;
                        return;
                    }
                    item = rx.recv() => {
                        let Some(item) = item else { return };
                        let _ = dispatched_tx.send((subscription_id, item.sequence_id)).await;
                        if auto_complete {
                            let _ = completions
                                .send(Completion { subscription_id, notification_id: item.notification_id, sequence_id: item.sequence_id })
                                .await;
                        }
                    }
                }
            }
        });

        (tx, handle)
    }
}

fn subscription(filter: &str, cursor: i64) -> Subscription {
    Subscription { id: SubscriptionId::new(), consumer_id: None, callback: "http://example/cb".into(), filter: filter.into(), event_cursor: cursor, created_at: Utc::now() }
}

fn change_log_entry(sequence_id: i64, after: serde_json::Value) -> ChangeLogEntry {
    ChangeLogEntry {
        id: ChangeLogEntryId::new(),
        sequence_id: Some(sequence_id),
        object_type: ObjectType::new("widget"),
        object_id: EntityId::new(),
        parent_id: None,
        data_source_id: DataSourceId::new(),
        before_state: None,
        after_state: Some(after),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn dispatch_fans_out_and_completion_advances_cursor_and_gcs_the_ledger() {
    let (spawned_tx, _spawned_rx) = mpsc::channel(16);
    let (dispatched_tx, mut dispatched_rx) = mpsc::channel(16);
    let (removed_tx, _removed_rx) = mpsc::channel(16);
    let (cursor_tx, mut cursor_rx) = mpsc::channel(16);
    let (deleted_tx, mut deleted_rx) = mpsc::channel(16);

    let sub = subscription("(eq,name,'c1')", 0);
    let sub_id = sub.id;
    let subscription_repo = Arc::new(FakeSubscriptionRepo { subs: Mutex::new(vec![sub]), cursor_tx });
    let ledger_repo = Arc::new(FakeLedgerRepo { backlog: Mutex::new(Vec::new()), deleted_tx });
    let spawner = Arc::new(RecordingSpawner { spawned_tx, dispatched_tx, removed_tx, auto_complete: true });
    let notifier = Notifier::new(ledger_repo.clone(), subscription_repo.clone(), spawner);

    let (notifications_tx, notifications_rx) = mpsc::channel(16);
    let (_subscriptions_tx, subscriptions_rx) = mpsc::channel(16);
    let (completions_tx, completions_rx) = mpsc::channel(16);
    let (catch_up_tx, _catch_up_rx) = oneshot::channel();
    let (shutdown_handle, shutdown) = shutdown_channel();

    let task = tokio::spawn(notifier.run(notifications_rx, subscriptions_rx, completions_rx, completions_tx, catch_up_tx, shutdown));

    notifications_tx.send(change_log_entry(1, json!({"name": "c1"}))).await.unwrap();

    let (dispatched_sub, dispatched_seq) = dispatched_rx.recv().await.unwrap();
    assert_eq!(dispatched_sub, sub_id);
    assert_eq!(dispatched_seq, 1);

    let (cursor_sub, cursor_value) = cursor_rx.recv().await.unwrap();
    assert_eq!(cursor_sub, sub_id);
    assert_eq!(cursor_value, 1);

    let deleted_seq = deleted_rx.recv().await.unwrap();
    assert_eq!(deleted_seq, 1);

    shutdown_handle.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn entry_with_no_live_subscriptions_is_garbage_collected_immediately() {
    let (spawned_tx, _spawned_rx) = mpsc::channel(16);
    let (dispatched_tx, _dispatched_rx) = mpsc::channel(16);
    let (removed_tx, _removed_rx) = mpsc::channel(16);
    let (cursor_tx, _cursor_rx) = mpsc::channel(16);
    let (deleted_tx, mut deleted_rx) = mpsc::channel(16);

    let subscription_repo = Arc::new(FakeSubscriptionRepo { subs: Mutex::new(Vec::new()), cursor_tx });
    let ledger_repo = Arc::new(FakeLedgerRepo { backlog: Mutex::new(Vec::new()), deleted_tx });
    let spawner = Arc::new(RecordingSpawner { spawned_tx, dispatched_tx, removed_tx, auto_complete: true });
    let notifier = Notifier::new(ledger_repo.clone(), subscription_repo.clone(), spawner);

    let (notifications_tx, notifications_rx) = mpsc::channel(16);
    let (_subscriptions_tx, subscriptions_rx) = mpsc::channel(16);
    let (completions_tx, completions_rx) = mpsc::channel(16);
    let (catch_up_tx, _catch_up_rx) = oneshot::channel();
    let (shutdown_handle, shutdown) = shutdown_channel();

    let task = tokio::spawn(notifier.run(notifications_rx, subscriptions_rx, completions_rx, completions_tx, catch_up_tx, shutdown));

    notifications_tx.send(change_log_entry(1, json!({"name": "anything"}))).await.unwrap();

    let deleted_seq = deleted_rx.recv().await.unwrap();
    assert_eq!(deleted_seq, 1);

    shutdown_handle.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn ledger_gc_is_blocked_by_a_subscriber_that_never_advances() {
    let (spawned_tx, _spawned_rx) = mpsc::channel(16);
    let (dispatched_tx, mut dispatched_rx) = mpsc::channel(16);
    let (removed_tx, _removed_rx) = mpsc::channel(16);
    let (cursor_tx, mut cursor_rx) = mpsc::channel(16);
    let (deleted_tx, mut deleted_rx) = mpsc::channel(16);

    let matching = subscription("(eq,name,'c1')", 0);
    let matching_id = matching.id;
    let lagging = subscription("(eq,name,'zzz')", 0);
    let subscription_repo = Arc::new(FakeSubscriptionRepo { subs: Mutex::new(vec![matching, lagging]), cursor_tx });
    let ledger_repo = Arc::new(FakeLedgerRepo { backlog: Mutex::new(Vec::new()), deleted_tx });
    let spawner = Arc::new(RecordingSpawner { spawned_tx, dispatched_tx, removed_tx, auto_complete: true });
    let notifier = Notifier::new(ledger_repo.clone(), subscription_repo.clone(), spawner);

    let (notifications_tx, notifications_rx) = mpsc::channel(16);
    let (_subscriptions_tx, subscriptions_rx) = mpsc::channel(16);
    let (completions_tx, completions_rx) = mpsc::channel(16);
    let (catch_up_tx, _catch_up_rx) = oneshot::channel();
    let (shutdown_handle, shutdown) = shutdown_channel();

    let task = tokio::spawn(notifier.run(notifications_rx, subscriptions_rx, completions_rx, completions_tx, catch_up_tx, shutdown));

    notifications_tx.send(change_log_entry(1, json!({"name": "c1"}))).await.unwrap();

    let (dispatched_sub, _) = dispatched_rx.recv().await.unwrap();
    assert_eq!(dispatched_sub, matching_id);

    let (cursor_sub, cursor_value) = cursor_rx.recv().await.unwrap();
    assert_eq!(cursor_sub, matching_id);
    assert_eq!(cursor_value, 1);

    assert!(deleted_rx.try_recv().is_err(), "the lagging subscriber's cursor is still behind, the entry must not be collected yet");

    shutdown_handle.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn subscription_added_at_runtime_receives_subsequent_dispatch() {
    let (spawned_tx, mut spawned_rx) = mpsc::channel(16);
    let (dispatched_tx, mut dispatched_rx) = mpsc::channel(16);
    let (removed_tx, _removed_rx) = mpsc::channel(16);
    let (cursor_tx, _cursor_rx) = mpsc::channel(16);
    let (deleted_tx, _deleted_rx) = mpsc::channel(16);

    let subscription_repo = Arc::new(FakeSubscriptionRepo { subs: Mutex::new(Vec::new()), cursor_tx });
    let ledger_repo = Arc::new(FakeLedgerRepo { backlog: Mutex::new(Vec::new()), deleted_tx });
    let spawner = Arc::new(RecordingSpawner { spawned_tx, dispatched_tx, removed_tx, auto_complete: true });
    let notifier = Notifier::new(ledger_repo.clone(), subscription_repo.clone(), spawner);

    let (notifications_tx, notifications_rx) = mpsc::channel(16);
    let (subscriptions_tx, subscriptions_rx) = mpsc::channel(16);
    let (completions_tx, completions_rx) = mpsc::channel(16);
    let (catch_up_tx, _catch_up_rx) = oneshot::channel();
    let (shutdown_handle, shutdown) = shutdown_channel();

    let task = tokio::spawn(notifier.run(notifications_rx, subscriptions_rx, completions_rx, completions_tx, catch_up_tx, shutdown));

    let sub = subscription("(eq,name,'c1')", 0);
    let sub_id = sub.id;
    subscriptions_tx.send(SubscriptionEvent::Add(sub)).await.unwrap();

    // Wait for the worker to actually be spawned before sending the
    // notification: both channels are polled by the same loop with
    // `notifications` ahead of `subscriptions` in priority, so without this
    // the entry could be evaluated against a worker set that doesn't yet
    // include the new subscription.
    let spawned = spawned_rx.recv().await.unwrap();
    assert_eq!(spawned, sub_id);

    notifications_tx.send(change_log_entry(1, json!({"name": "c1"}))).await.unwrap();

    let (dispatched_sub, dispatched_seq) = dispatched_rx.recv().await.unwrap();
    assert_eq!(dispatched_sub, sub_id);
    assert_eq!(dispatched_seq, 1);

    shutdown_handle.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn subscription_removed_stops_dispatch_and_unblocks_gc() {
    let (spawned_tx, _spawned_rx) = mpsc::channel(16);
    let (dispatched_tx, mut dispatched_rx) = mpsc::channel(16);
    let (removed_tx, mut removed_rx) = mpsc::channel(16);
    let (cursor_tx, mut cursor_rx) = mpsc::channel(16);
    let (deleted_tx, mut deleted_rx) = mpsc::channel(16);

    let sub = subscription("(eq,name,'c1')", 0);
    let sub_id = sub.id;
    let subscription_repo = Arc::new(FakeSubscriptionRepo { subs: Mutex::new(vec![sub]), cursor_tx });
    let ledger_repo = Arc::new(FakeLedgerRepo { backlog: Mutex::new(Vec::new()), deleted_tx });
    let spawner = Arc::new(RecordingSpawner { spawned_tx, dispatched_tx, removed_tx, auto_complete: true });
    let notifier = Notifier::new(ledger_repo.clone(), subscription_repo.clone(), spawner);

    let (notifications_tx, notifications_rx) = mpsc::channel(16);
    let (subscriptions_tx, subscriptions_rx) = mpsc::channel(16);
    let (completions_tx, completions_rx) = mpsc::channel(16);
    let (catch_up_tx, _catch_up_rx) = oneshot::channel();
    let (shutdown_handle, shutdown) = shutdown_channel();

    let task = tokio::spawn(notifier.run(notifications_rx, subscriptions_rx, completions_rx, completions_tx, catch_up_tx, shutdown));

    // Round-trip once to confirm the seeded subscription is live.
    notifications_tx.send(change_log_entry(1, json!({"name": "c1"}))).await.unwrap();
    dispatched_rx.recv().await.unwrap();
    cursor_rx.recv().await.unwrap();
    deleted_rx.recv().await.unwrap();

    subscriptions_tx.send(SubscriptionEvent::Remove(sub_id)).await.unwrap();
    let removed = removed_rx.recv().await.unwrap();
    assert_eq!(removed, sub_id);

    notifications_tx.send(change_log_entry(2, json!({"name": "c1"}))).await.unwrap();
    let deleted_seq = deleted_rx.recv().await.unwrap();
    assert_eq!(deleted_seq, 2, "with the subscriber gone, the entry should be collected immediately rather than dispatched");
    assert!(dispatched_rx.try_recv().is_err(), "a removed subscription must not receive further dispatches");

    shutdown_handle.trigger();
    task.await.unwrap();
}
