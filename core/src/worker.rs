//! Subscription Worker (spec.md §4.7): one per live subscription, owns an
//! in-memory FIFO and retries delivery with a fixed delay. State naming
//! mirrors the `SubscriptionState` used by the teacher's subscription
//! relay actor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use notify_proto::{NotificationId, NotificationPayload, SubscriptionId};

use crate::ports::{BearerTokenProvider, DeliveryClient};
use crate::shutdown::Shutdown;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

pub struct WorkItem {
    pub notification_id: NotificationId,
    pub sequence_id: i64,
    pub payload: NotificationPayload,
}

/// Reported on the Notifier's completions channel after every terminal
/// outcome, successful or exhausted (spec.md §4.7 "Completion reporting").
pub struct Completion {
    pub subscription_id: SubscriptionId,
    pub notification_id: NotificationId,
    pub sequence_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Idle,
    Sending,
    Done,
    Failed,
}

pub struct SubscriptionWorker {
    subscription_id: SubscriptionId,
    callback: String,
    delivery: Arc<dyn DeliveryClient>,
    token_provider: Arc<dyn BearerTokenProvider>,
    max_retries: u32,
    retry_delay: Duration,
}

impl SubscriptionWorker {
    pub fn new(subscription_id: SubscriptionId, callback: String, delivery: Arc<dyn DeliveryClient>, token_provider: Arc<dyn BearerTokenProvider>) -> Self {
        Self { subscription_id, callback, delivery, token_provider, max_retries: DEFAULT_MAX_RETRIES, retry_delay: DEFAULT_RETRY_DELAY }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Drains `rx` one item at a time; on shutdown, any item still queued
    /// (not yet dequeued) is handed back to the Notifier untried, via the
    /// completions channel, so it can attempt to free the ledger row
    /// (spec.md §4.7 "Shutdown").
    pub async fn run(self, mut rx: mpsc::Receiver<WorkItem>, completions: mpsc::Sender<Completion>, mut shutdown: Shutdown) {
        let mut state = WorkerState::Idle;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    rx.close();
                    while let Ok(item) = rx.try_recv() {
                        let _ = completions
                            .send(Completion { subscription_id: self.subscription_id, notification_id: item.notification_id, sequence_id: item.sequence_id })
                            .await;
                    }
                    return;
                }
                item = rx.recv() => {
                    let Some(item) = item else { return };
                    state = WorkerState::Sending;
                    let outcome = self.deliver_with_retry(&item, &mut shutdown).await;
                    state = if outcome { WorkerState::Done } else { WorkerState::Failed };
                    tracing::debug!(subscription_id = %self.subscription_id, sequence_id = item.sequence_id, ?state, "delivery attempt finished");
                    if completions
                        .send(Completion { subscription_id: self.subscription_id, notification_id: item.notification_id, sequence_id: item.sequence_id })
                        .await
                        .is_err()
                    {
                        return;
                    }
                    state = WorkerState::Idle;
                }
            }
        }
    }

    /// Returns `true` if a 2xx response was ever received, `false` if
    /// retries were exhausted. Either way the caller still reports the
    /// notification as terminal (spec.md §4.7: exhausted retries are
    /// "considered delivered").
    async fn deliver_with_retry(&self, item: &WorkItem, shutdown: &mut Shutdown) -> bool {
        for attempt in 1..=self.max_retries {
            if shutdown.is_triggered() {
                return false;
            }

            let token = match self.token_provider.token().await {
                Ok(token) => token,
                Err(err) => {
                    tracing::warn!(subscription_id = %self.subscription_id, error = %err, "bearer token fetch failed");
                    None
                }
            };

            match self.delivery.post(&self.callback, &item.payload, token.as_deref()).await {
                Ok(response) if response.is_success() => return true,
                Ok(response) => {
                    tracing::warn!(subscription_id = %self.subscription_id, attempt, status = response.status, "delivery rejected");
                }
                Err(err) => {
                    tracing::warn!(subscription_id = %self.subscription_id, attempt, error = %err, "delivery transport error");
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        tracing::error!(
            subscription_id = %self.subscription_id,
            sequence_id = item.sequence_id,
            max_retries = self.max_retries,
            "delivery retries exhausted, considering delivered"
        );
        false
    }
}
