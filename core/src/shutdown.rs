//! Cooperative cancellation handle (spec.md §5: "every suspending call
//! accepts a cancellation handle; on cancellation the task releases
//! resources and exits"), modeled as a `tokio::sync::watch<bool>` the way
//! `SubscriptionRelay` gates its background work on shared signals.

use tokio::sync::watch;

#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

impl ShutdownHandle {
    /// Signal every outstanding [`Shutdown`] clone to stop. Idempotent.
    pub fn trigger(&self) { let _ = self.tx.send(true); }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool { *self.rx.borrow() }

    /// Resolves once shutdown has been triggered; safe to `select!` against.
    pub async fn triggered(&mut self) {
        if self.is_triggered() {
            return;
        }
        let _ = self.rx.changed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn triggered_resolves_after_trigger() {
        let (handle, mut shutdown) = shutdown_channel();
        assert!(!shutdown.is_triggered());
        handle.trigger();
        shutdown.triggered().await;
        assert!(shutdown.is_triggered());
    }
}
