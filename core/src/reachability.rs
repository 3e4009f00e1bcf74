//! Callback reachability probe (spec.md §4.5, §6): a GET against the
//! subscriber's callback URL, required to succeed (2xx/3xx/204) before a
//! subscription is created.

use crate::ports::DeliveryClient;

/// `true` iff the probe should be treated as reachable. Transport errors
/// are treated as unreachable, not propagated as a distinct error kind —
/// the caller only needs a yes/no to decide whether to reject creation.
pub async fn probe(delivery: &dyn DeliveryClient, callback: &str) -> bool {
    match delivery.probe(callback).await {
        Ok(reachable) => reachable,
        Err(err) => {
            tracing::warn!(callback, error = %err, "reachability probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::ports::DeliveryResponse;

    use super::*;

    struct FixedProbe(bool);

    #[async_trait]
    impl DeliveryClient for FixedProbe {
        async fn post(&self, _url: &str, _payload: &notify_proto::NotificationPayload, _token: Option<&str>) -> Result<DeliveryResponse, anyhow::Error> {
            unreachable!("not exercised by this test")
        }

        async fn probe(&self, _url: &str) -> Result<bool, anyhow::Error> { Ok(self.0) }
    }

    struct FailingProbe;

    #[async_trait]
    impl DeliveryClient for FailingProbe {
        async fn post(&self, _url: &str, _payload: &notify_proto::NotificationPayload, _token: Option<&str>) -> Result<DeliveryResponse, anyhow::Error> {
            unreachable!("not exercised by this test")
        }

        async fn probe(&self, _url: &str) -> Result<bool, anyhow::Error> { Err(anyhow::anyhow!("connection refused")) }
    }

    #[tokio::test]
    async fn reachable_probe_returns_true() {
        assert!(probe(&FixedProbe(true), "http://example/cb").await);
    }

    #[tokio::test]
    async fn unreachable_probe_returns_false() {
        assert!(!probe(&FixedProbe(false), "http://example/cb").await);
    }

    #[tokio::test]
    async fn transport_error_is_treated_as_unreachable() {
        assert!(!probe(&FailingProbe, "http://example/cb").await);
    }
}
