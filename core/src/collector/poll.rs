//! Poll-mode collector loop (spec.md §4.2 "Poll mode").

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use notify_proto::ObjectType;

use crate::datasource::DataSourceRegistry;
use crate::error::CollectorError;

use super::CollectorEvent;

/// One object as enumerated from the external source, before the collector
/// assigns it a row id or resolves its parent reference.
pub struct PolledObject {
    pub external_id: String,
    pub body: serde_json::Value,
    pub parent_ref: Option<notify_proto::ParentRef>,
}

/// A full enumeration of one object type from one data source. Poll mode
/// has no incremental story — every tick re-lists everything (spec.md
/// §4.2 step (b)).
#[async_trait]
pub trait PollSource: Send + Sync {
    fn object_type(&self) -> ObjectType;

    async fn list(&self) -> Result<Vec<PolledObject>, CollectorError>;
}

/// Runs one `source` on a fixed `interval`, feeding every enumerated object
/// plus an end-of-cycle marker into `tx` for the shared serial event loop
/// (spec.md §4.1, §4.2).
pub async fn run_poll_loop(
    data_source_name: String,
    registry: Arc<DataSourceRegistry>,
    sources: Vec<Arc<dyn PollSource>>,
    tx: mpsc::Sender<CollectorEvent>,
    interval: Duration,
    mut shutdown: crate::shutdown::Shutdown,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                tracing::info!(data_source = %data_source_name, "poll loop shutting down");
                return;
            }
            _ = ticker.tick() => {
                if let Err(err) = run_one_cycle(&data_source_name, &registry, &sources, &tx).await {
                    tracing::warn!(data_source = %data_source_name, error = %err, "poll cycle failed, will retry next tick");
                }
            }
        }
    }
}

async fn run_one_cycle(
    data_source_name: &str,
    registry: &DataSourceRegistry,
    sources: &[Arc<dyn PollSource>],
    tx: &mpsc::Sender<CollectorEvent>,
) -> Result<(), CollectorError> {
    let guard = registry.begin_poll_cycle(data_source_name).await?;
    let data_source_id = guard.data_source_id();
    let generation_id = guard.generation_id();

    let mut object_types = Vec::with_capacity(sources.len());
    for source in sources {
        let object_type = source.object_type();
        object_types.push(object_type.clone());

        for object in source.list().await? {
            let event = CollectorEvent::PollObject {
                data_source_id,
                object_type: object_type.clone(),
                generation_id,
                external_id: object.external_id,
                body: object.body,
                parent_ref: object.parent_ref,
            };
            if tx.send(event).await.is_err() {
                tracing::warn!("collector event loop closed mid-cycle, abandoning cycle");
                return Ok(());
            }
        }
    }

    if tx.send(CollectorEvent::PollCycleEnd { guard, object_types }).await.is_err() {
        tracing::warn!("collector event loop closed before cycle end marker");
    }
    Ok(())
}

#[cfg(test)]
pub struct InMemorySource {
    pub object_type: ObjectType,
    pub objects: Vec<PolledObject>,
}

#[cfg(test)]
#[async_trait]
impl PollSource for InMemorySource {
    fn object_type(&self) -> ObjectType { self.object_type.clone() }

    async fn list(&self) -> Result<Vec<PolledObject>, CollectorError> {
        Ok(self
            .objects
            .iter()
            .map(|o| PolledObject { external_id: o.external_id.clone(), body: o.body.clone(), parent_ref: o.parent_ref.clone() })
            .collect())
    }
}
