//! Alert Ingest Path (spec.md §4.8): webhook deltas and full snapshots
//! both flow through the Change Log Writer, so subscribers see per-alarm
//! events rather than batch events.

use std::sync::Arc;

use serde_json::Value;

use notify_proto::{DataSourceId, ObjectType, ParentRef};

use crate::change_log_writer::persist_with_change_event;
use crate::clock::Clock;
use crate::collector::derive_entity_id;
use crate::error::CollectorError;
use crate::model::EntityRecord;
use crate::ports::EntityRepository;

/// Whether this ingestion represents the complete current state of the
/// source (triggers the resolve sweep) or an incremental delta (never
/// does).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestKind {
    Webhook,
    Snapshot,
}

pub struct AlertInput {
    pub external_id: String,
    pub body: Value,
    pub parent_ref: Option<ParentRef>,
}

pub struct AlertIngest {
    entity_repo: Arc<dyn EntityRepository>,
    clock: Arc<dyn Clock>,
    object_type: ObjectType,
}

impl AlertIngest {
    pub fn new(entity_repo: Arc<dyn EntityRepository>, clock: Arc<dyn Clock>, object_type: ObjectType) -> Self {
        Self { entity_repo, clock, object_type }
    }

    pub async fn ingest(&self, data_source_id: DataSourceId, alerts: Vec<AlertInput>, kind: IngestKind) -> Result<(), CollectorError> {
        let generation_tag = self.clock.generation_tag();
        let now = self.clock.now();

        let mut tx = self.entity_repo.begin().await?;

        for alert in alerts {
            let parent_id = match alert.parent_ref {
                None => None,
                Some(ParentRef::Id(id)) => Some(id),
                Some(ParentRef::Name(name)) => match self.entity_repo.find_by_external_id(&self.object_type, data_source_id, &name).await? {
                    Some(parent) => Some(parent.id),
                    None => {
                        tracing::warn!(%name, "alert parent not found by name, dropping event");
                        continue;
                    }
                },
            };

            let record = EntityRecord {
                id: derive_entity_id(data_source_id, &self.object_type, &alert.external_id),
                object_type: self.object_type.clone(),
                data_source_id,
                generation_id: generation_tag,
                external_id: alert.external_id,
                parent_id,
                body: alert.body,
                created_at: now,
            };

            persist_with_change_event(&mut *tx, &record, |r| r.body.clone()).await?;
        }

        if kind == IngestKind::Snapshot {
            let stale = tx.list_stale(&self.object_type, data_source_id, generation_tag).await?;
            for mut stale_alert in stale {
                mark_resolved(&mut stale_alert.body);
                persist_with_change_event(&mut *tx, &stale_alert, |r| r.body.clone()).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

fn mark_resolved(body: &mut Value) {
    if let Value::Object(map) = body {
        map.insert("status".to_string(), Value::String("resolved".to_string()));
    }
}
