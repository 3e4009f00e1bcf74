//! Watch-mode collector loop (spec.md §4.2 "Watch mode").
//!
//! The source owns its own change-stream connection; this module's only
//! job is forwarding `AsyncChangeEvent`s onto the shared serial event loop
//! channel, respecting shutdown.

use async_trait::async_trait;
use tokio::sync::mpsc;

use notify_proto::AsyncChangeEvent;

use super::CollectorEvent;
use crate::shutdown::Shutdown;

/// A change stream from an external source that supports push notification
/// (spec.md §4.2: "If the source supports it").
#[async_trait]
pub trait WatchSource: Send + Sync {
    /// Blocks until the next event is available, or returns `None` once the
    /// stream has ended (expiry, disconnect).
    async fn next_event(&mut self) -> Option<AsyncChangeEvent>;
}

pub async fn run_watch_loop(mut source: Box<dyn WatchSource>, tx: mpsc::Sender<CollectorEvent>, mut shutdown: Shutdown) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => return,
            event = source.next_event() => {
                match event {
                    Some(event) => {
                        if tx.send(CollectorEvent::Watch(event)).await.is_err() {
                            return;
                        }
                    }
                    None => {
                        tracing::info!("watch stream ended");
                        return;
                    }
                }
            }
        }
    }
}
