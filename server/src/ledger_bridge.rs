//! Bridges [`notify_core::ports::LedgerSignal`] wake-ups into the concrete
//! `ChangeLogEntry` stream the Notifier's `notifications` channel expects
//! (spec.md §4.4: "a push path and a timer path race; either can wake the
//! Notifier", which then re-reads the ledger rather than trusting the
//! notification payload itself).
//!
//! The bridge does not pick its own starting `sequence_id` — it waits for
//! the Notifier to report where its startup backlog replay left off via
//! `catch_up`. Reading the ledger tail independently here would race the
//! Notifier's own backlog read and could dispatch the same entry twice (or,
//! depending on timing, skip one).

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use notify_core::ports::{LedgerRepository, LedgerSignal};
use notify_core::shutdown::Shutdown;
use notify_proto::ChangeLogEntry;

pub async fn run(
    ledger_repo: Arc<dyn LedgerRepository>,
    mut signal: Box<dyn LedgerSignal>,
    tx: mpsc::Sender<ChangeLogEntry>,
    catch_up: oneshot::Receiver<i64>,
    mut shutdown: Shutdown,
) {
    let mut last_seen = tokio::select! {
        biased;
        _ = shutdown.triggered() => {
            tracing::info!("ledger bridge shutting down before notifier startup completed");
            return;
        }
        result = catch_up => {
            match result {
                Ok(last_seen) => last_seen,
                Err(_) => {
                    tracing::error!("notifier dropped without reporting a startup catch-up point, ledger bridge exiting");
                    return;
                }
            }
        }
    };

    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                tracing::info!("ledger bridge shutting down");
                return;
            }
            woken = signal.recv() => {
                if woken.is_none() {
                    tracing::info!("ledger signal source closed");
                    return;
                }
            }
        }

        let entries = match ledger_repo.load_since(last_seen).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(error = %err, "ledger bridge failed to read backlog");
                continue;
            }
        };

        for entry in entries {
            if let Some(sequence_id) = entry.sequence_id {
                last_seen = last_seen.max(sequence_id);
            }
            if tx.send(entry).await.is_err() {
                tracing::warn!("notifier channel closed, stopping ledger bridge");
                return;
            }
        }
    }
}
