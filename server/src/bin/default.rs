use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::Level;

use notify_core::ports::{LedgerRepository, SubscriptionRepository};
use notify_core::shutdown::shutdown_channel;
use notify_core::{Notifier, SubscriptionService};
use notify_server::config::Config;
use notify_server::health::{self, ReadinessFlag};
use notify_server::ledger_bridge;
use notify_server::wiring::{ReqwestDeliveryClient, StaticBearerTokenProvider, TokioWorkerSpawner};
use notify_storage_postgres::Postgres;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "fatal configuration error");
            std::process::exit(1);
        }
    };

    let pg = Postgres::connect(config.database_url.clone()).await?;
    let ledger_repo: Arc<dyn LedgerRepository> = Arc::new(pg.ledger_repository());
    let subscription_repo: Arc<dyn SubscriptionRepository> = Arc::new(pg.subscription_repository());

    // Collector tasks are intentionally not spawned here: they need a real
    // cluster-API/alert-stream client, which is out of scope (spec.md §1).
    // An embedder plugs `notify_core::collector::Collector` in alongside
    // this wiring using `pg.datasource_repository()`/`pg.entity_repository()`.

    let delivery = Arc::new(ReqwestDeliveryClient::new(Duration::from_secs(30)));
    let token_provider = Arc::new(StaticBearerTokenProvider::new(std::env::var("SUBSCRIBER_BEARER_TOKEN").ok()));
    let spawner = Arc::new(TokioWorkerSpawner::new(delivery.clone(), token_provider, config.max_retries, config.retry_delay));

    let (notifications_tx, notifications_rx) = mpsc::channel(config.notifications_channel_capacity);
    let (subscriptions_tx, subscriptions_rx) =
        mpsc::channel::<notify_core::SubscriptionEvent>(config.subscriptions_channel_capacity);
    let (completions_tx, completions_rx) = mpsc::channel(config.completions_channel_capacity);

    let (shutdown_handle, shutdown) = shutdown_channel();
    let (catch_up_tx, catch_up_rx) = tokio::sync::oneshot::channel();

    // `pg.ledger_signal(...)` establishes its LISTEN connection here, before
    // either task below is spawned, so no commit can slip past both the
    // bridge's live tailing and the Notifier's startup backlog read.
    let signal = pg.ledger_signal(config.catch_up_interval).await?;
    let bridge_handle =
        tokio::spawn(ledger_bridge::run(ledger_repo.clone(), Box::new(signal), notifications_tx, catch_up_rx, shutdown.clone()));

    let notifier = Notifier::new(ledger_repo.clone(), subscription_repo.clone(), spawner);
    let notifier_handle =
        tokio::spawn(notifier.run(notifications_rx, subscriptions_rx, completions_rx, completions_tx, catch_up_tx, shutdown.clone()));

    // Kept alive so the Notifier's `subscriptions` channel doesn't close;
    // an embedder's own CRUD surface (out of scope here, spec.md §1) would
    // forward `SubscriptionEvent::Add` through this sender after calling
    // `SubscriptionService::create`.
    let _subscription_service = SubscriptionService::new(subscription_repo, ledger_repo, delivery);
    let _subscriptions_tx = subscriptions_tx;

    let readiness = ReadinessFlag::default();
    readiness.mark_ready();
    let health_handle = tokio::spawn(health::serve(config.http_bind_address.clone(), readiness));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    shutdown_handle.trigger();

    let _ = notifier_handle.await;
    let _ = bridge_handle.await;
    health_handle.abort();

    Ok(())
}
