//! Notifier (spec.md §4.6): a single-threaded coordinator reading four
//! bounded channels. The live subscription set — and therefore the map of
//! running workers — is mutated only here, mirroring the way
//! `SubscriptionRelay` owns its watcher map and never lets another task
//! touch it directly.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use notify_filter::Filter;
use notify_proto::{ChangeLogEntry, NotificationEventType, NotificationId, NotificationPayload, SubscriptionId};

use crate::model::Subscription;
use crate::ports::{LedgerRepository, SubscriptionRepository};
use crate::shutdown::{Shutdown, ShutdownHandle};
use crate::worker::{Completion, WorkItem};

/// Add/remove events on the `subscriptions` channel (spec.md §4.6).
pub enum SubscriptionEvent {
    Add(Subscription),
    Remove(SubscriptionId),
}

struct LiveWorker {
    filter: Filter,
    cursor: i64,
    sender: mpsc::Sender<WorkItem>,
    shutdown: ShutdownHandle,
}

/// Everything the Notifier needs to spawn a worker for a subscription,
/// supplied by the wiring code in `notify-server` (delivery client, token
/// provider, retry policy).
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self, subscription: &Subscription, completions: mpsc::Sender<Completion>) -> (mpsc::Sender<WorkItem>, ShutdownHandle);
}

pub struct Notifier {
    ledger_repo: Arc<dyn LedgerRepository>,
    subscription_repo: Arc<dyn SubscriptionRepository>,
    spawner: Arc<dyn WorkerSpawner>,
    workers: HashMap<SubscriptionId, LiveWorker>,
}

impl Notifier {
    pub fn new(ledger_repo: Arc<dyn LedgerRepository>, subscription_repo: Arc<dyn SubscriptionRepository>, spawner: Arc<dyn WorkerSpawner>) -> Self {
        Self { ledger_repo, subscription_repo, spawner, workers: HashMap::new() }
    }

    /// Startup: load subscriptions, spawn workers, replay the ledger tail
    /// each subscription hasn't yet seen (spec.md §4.6 "Startup").
    ///
    /// `ledger_catch_up` reports the highest `sequence_id` this startup
    /// backlog replay observed, so the ledger-signal listener feeding
    /// `notifications` knows exactly where to resume live tailing from —
    /// without this handoff, the listener's own independent idea of "where
    /// to start" can race startup's backlog read and dispatch the same
    /// entry twice.
    pub async fn run(
        mut self,
        mut notifications: mpsc::Receiver<ChangeLogEntry>,
        mut subscriptions: mpsc::Receiver<SubscriptionEvent>,
        mut completions: mpsc::Receiver<Completion>,
        completions_tx: mpsc::Sender<Completion>,
        ledger_catch_up: oneshot::Sender<i64>,
        mut shutdown: Shutdown,
    ) {
        let last_seen = match self.startup(&completions_tx).await {
            Ok(last_seen) => last_seen,
            Err(err) => {
                tracing::error!(error = %err, "notifier startup failed");
                return;
            }
        };
        let _ = ledger_catch_up.send(last_seen);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    tracing::info!("notifier shutting down");
                    return;
                }
                Some(completion) = completions.recv() => self.on_completion(completion).await,
                Some(entry) = notifications.recv() => self.dispatch(entry).await,
                Some(event) = subscriptions.recv() => self.on_subscription_event(event, &completions_tx).await,
                else => return,
            }
        }
    }

    /// Returns the highest `sequence_id` observed in this backlog replay (or
    /// `min_cursor` if the ledger had nothing past it), for the caller to
    /// hand to the live ledger-signal listener as its starting point.
    async fn startup(&mut self, completions_tx: &mpsc::Sender<Completion>) -> Result<i64, crate::error::RepositoryError> {
        let subs = self.subscription_repo.list().await?;
        for sub in &subs {
            self.spawn_worker(sub, completions_tx.clone());
        }

        let min_cursor = subs.iter().map(|s| s.event_cursor).min().unwrap_or(0);
        let backlog = self.ledger_repo.load_since(min_cursor).await?;
        let mut last_seen = min_cursor;
        for entry in backlog {
            if let Some(sequence_id) = entry.sequence_id {
                last_seen = last_seen.max(sequence_id);
            }
            self.dispatch(entry).await;
        }
        Ok(last_seen)
    }

    fn spawn_worker(&mut self, sub: &Subscription, completions_tx: mpsc::Sender<Completion>) {
        let filter = match notify_filter::parse(&sub.filter) {
            Ok(filter) => filter,
            Err(err) => {
                tracing::error!(subscription_id = %sub.id, error = ?err, "stored subscription filter failed to parse, skipping");
                return;
            }
        };

        let (sender, shutdown) = self.spawner.spawn(sub, completions_tx);
        self.workers.insert(sub.id, LiveWorker { filter, cursor: sub.event_cursor, sender, shutdown });
    }

    /// Dispatch one ledger entry to every matching, not-yet-caught-up
    /// worker (spec.md §4.6 "Dispatch algorithm").
    async fn dispatch(&mut self, entry: ChangeLogEntry) {
        let Some(sequence_id) = entry.sequence_id else {
            tracing::warn!("dispatch called with an unpersisted change-log entry");
            return;
        };
        let projected = entry.after_state.as_ref().or(entry.before_state.as_ref());

        let mut matched = false;
        for (sub_id, worker) in self.workers.iter_mut() {
            if worker.cursor >= sequence_id {
                continue;
            }
            let is_match = match projected {
                Some(value) => match notify_filter::matches(&worker.filter, value) {
                    Ok(result) => result,
                    Err(err) => {
                        tracing::warn!(subscription_id = %sub_id, error = %err, "filter evaluation failed, treating as non-match");
                        false
                    }
                },
                None => false,
            };
            if !is_match {
                continue;
            }
            matched = true;
            let payload = transform(&entry, *sub_id);
            let item = WorkItem { notification_id: payload.notification_id, sequence_id, payload };
            if worker.sender.send(item).await.is_err() {
                tracing::warn!(subscription_id = %sub_id, "worker channel closed, dropping notification");
            }
        }

        if !matched {
            self.try_delete(sequence_id).await;
        }
    }

    async fn on_completion(&mut self, completion: Completion) {
        if let Some(worker) = self.workers.get_mut(&completion.subscription_id) {
            worker.cursor = completion.sequence_id;
            if let Err(err) = self.subscription_repo.update_cursor(completion.subscription_id, completion.sequence_id).await {
                tracing::error!(subscription_id = %completion.subscription_id, error = %err, "failed to persist cursor advance");
            }
        }
        self.try_delete(completion.sequence_id).await;
    }

    async fn on_subscription_event(&mut self, event: SubscriptionEvent, completions_tx: &mpsc::Sender<Completion>) {
        match event {
            SubscriptionEvent::Add(sub) => {
                tracing::info!(subscription_id = %sub.id, "subscription added");
                self.spawn_worker(&sub, completions_tx.clone());
            }
            SubscriptionEvent::Remove(id) => {
                if let Some(worker) = self.workers.remove(&id) {
                    worker.shutdown.trigger();
                    tracing::info!(subscription_id = %id, "subscription removed, worker signalled");
                    // In-flight notifications return via the completion
                    // channel as the worker drains (spec.md §4.7
                    // "Shutdown"); `on_completion` frees the ledger once
                    // they arrive.
                }
            }
        }
    }

    async fn try_delete(&self, sequence_id: i64) {
        let min_cursor = self.workers.values().map(|w| w.cursor).min().unwrap_or(i64::MAX);
        if min_cursor < sequence_id {
            return;
        }
        match self.ledger_repo.delete_if_safe(sequence_id, min_cursor).await {
            Ok(_) => {}
            Err(err) => tracing::error!(sequence_id, error = %err, "failed to garbage-collect ledger entry"),
        }
    }
}

/// Subscription-type-specific rewrite (spec.md §4.6 step 1): attaches the
/// subscriber's own id to the payload.
fn transform(entry: &ChangeLogEntry, subscription_id: SubscriptionId) -> NotificationPayload {
    let event_type = match (&entry.before_state, &entry.after_state) {
        (None, Some(_)) => NotificationEventType::Create,
        (Some(_), None) => NotificationEventType::Delete,
        _ => NotificationEventType::Modify,
    };
    let object = entry.after_state.clone().or_else(|| entry.before_state.clone()).unwrap_or(serde_json::Value::Null);

    NotificationPayload {
        notification_id: NotificationId::new(),
        consumer_subscription_id: Some(subscription_id),
        notification_event_type: event_type,
        object_ref: entry.object_id.to_string(),
        object,
    }
}
