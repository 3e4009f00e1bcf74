//! Concrete adapters for the trait objects `notify-core` is built against:
//! HTTP delivery, bearer tokens, and worker spawning (spec.md §4.7, §6).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use notify_core::model::Subscription;
use notify_core::ports::{BearerTokenProvider, DeliveryClient, DeliveryResponse};
use notify_core::shutdown::{shutdown_channel, Shutdown, ShutdownHandle};
use notify_core::worker::{Completion, SubscriptionWorker, WorkItem};
use notify_core::WorkerSpawner;
use notify_proto::NotificationPayload;

/// Reachability probes and delivery POSTs over `reqwest` (spec.md §4.5,
/// §4.7). Construction of an OAuth client is explicitly out of scope
/// (spec.md §1); the bearer token, if any, is handed in by
/// [`BearerTokenProvider`] rather than fetched here.
pub struct ReqwestDeliveryClient {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl ReqwestDeliveryClient {
    pub fn new(request_timeout: Duration) -> Self { Self { client: reqwest::Client::new(), request_timeout } }
}

#[async_trait]
impl DeliveryClient for ReqwestDeliveryClient {
    async fn post(&self, url: &str, payload: &NotificationPayload, bearer_token: Option<&str>) -> Result<DeliveryResponse, anyhow::Error> {
        let mut request = self.client.post(url).timeout(self.request_timeout).json(payload);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        Ok(DeliveryResponse { status: response.status().as_u16() })
    }

    async fn probe(&self, url: &str) -> Result<bool, anyhow::Error> {
        let response = self.client.get(url).timeout(self.request_timeout).send().await?;
        let status = response.status();
        Ok(status.is_success() || status.is_redirection() || status == reqwest::StatusCode::NO_CONTENT)
    }
}

/// A single static token read at startup, or none. This subsystem does not
/// implement OAuth token refresh itself (spec.md §1 "pre-built HTTP client
/// factory" non-goal) — an embedder with real OAuth needs swaps this for
/// their own `BearerTokenProvider`.
pub struct StaticBearerTokenProvider {
    token: Option<String>,
}

impl StaticBearerTokenProvider {
    pub fn new(token: Option<String>) -> Self { Self { token } }
}

#[async_trait]
impl BearerTokenProvider for StaticBearerTokenProvider {
    async fn token(&self) -> Result<Option<String>, anyhow::Error> { Ok(self.token.clone()) }
}

/// Spawns one `SubscriptionWorker` task per subscription (spec.md §4.7),
/// wired with the shared delivery client/token provider/retry policy.
pub struct TokioWorkerSpawner {
    delivery: Arc<dyn DeliveryClient>,
    token_provider: Arc<dyn BearerTokenProvider>,
    max_retries: u32,
    retry_delay: Duration,
}

impl TokioWorkerSpawner {
    pub fn new(delivery: Arc<dyn DeliveryClient>, token_provider: Arc<dyn BearerTokenProvider>, max_retries: u32, retry_delay: Duration) -> Self {
        Self { delivery, token_provider, max_retries, retry_delay }
    }
}

impl WorkerSpawner for TokioWorkerSpawner {
    fn spawn(&self, subscription: &Subscription, completions: mpsc::Sender<Completion>) -> (mpsc::Sender<WorkItem>, ShutdownHandle) {
        // Bounded for memory safety; spec.md §5 notes the FIFO is unbounded
        // in principle but stays small in steady state via ledger deletes.
        let (tx, rx) = mpsc::channel(1024);
        let (handle, shutdown): (ShutdownHandle, Shutdown) = shutdown_channel();

        let worker = SubscriptionWorker::new(subscription.id, subscription.callback.clone(), self.delivery.clone(), self.token_provider.clone())
            .with_retry_policy(self.max_retries, self.retry_delay);

        tokio::spawn(worker.run(rx, completions, shutdown));
        (tx, handle)
    }
}
