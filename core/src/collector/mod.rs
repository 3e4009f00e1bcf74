//! Collector (spec.md §4.2): a single serial event loop fed by both poll and
//! watch sources. One event is fully processed — including its transaction
//! — before the next is dequeued, so the loop owns no concurrency of its
//! own; parallelism across data sources comes from running one `Collector`
//! task per source.

pub mod poll;
pub mod watch;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use notify_proto::{AsyncChangeEvent, CollectorEventKind, DataSourceId, EntityId, ObjectType, ParentRef};

use crate::change_log_writer::{delete_with_change_event, persist_with_change_event};
use crate::datasource::{DataSourceRegistry, PollCycleGuard};
use crate::error::CollectorError;
use crate::model::EntityRecord;
use crate::ports::EntityRepository;
use crate::shutdown::Shutdown;

/// Default bound on the channel feeding the serial event loop (spec.md
/// §4.2: "concurrency with collection loops is bounded by the channel
/// buffer (default 10)").
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

const ENTITY_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x1c, 0xb2, 0x6a, 0x59, 0xe3, 0x0e, 0x4d, 0x2a, 0x9f, 0x4b, 0x61, 0xd4, 0xaa, 0x90, 0x6e, 0x31,
]);

/// Deterministic row id for `(data_source, object_type, external_id)`, so
/// the same logical object always lands on the same primary key across
/// re-observations without the collector keeping its own id cache.
pub(crate) fn derive_entity_id(data_source_id: DataSourceId, object_type: &ObjectType, external_id: &str) -> EntityId {
    let key = format!("{}/{}/{}", data_source_id, object_type, external_id);
    EntityId::from_uuid(Uuid::new_v5(&ENTITY_ID_NAMESPACE, key.as_bytes()))
}

/// Internal unit of work for the serial loop. Watch-sourced events carry
/// the wire `AsyncChangeEvent` directly; poll-sourced ones are pre-expanded
/// per object because a poll cycle has no natural single "event" until it
/// ends.
pub enum CollectorEvent {
    Watch(AsyncChangeEvent),
    PollObject {
        data_source_id: DataSourceId,
        object_type: ObjectType,
        generation_id: i64,
        external_id: String,
        body: Value,
        parent_ref: Option<ParentRef>,
    },
    PollCycleEnd {
        guard: PollCycleGuard,
        object_types: Vec<ObjectType>,
    },
}

pub struct Collector {
    entity_repo: Arc<dyn EntityRepository>,
    /// Kinds this collector instance is configured to understand. Anything
    /// else is "logged warning and no state change" (spec.md §4.2).
    known_kinds: HashSet<ObjectType>,
}

impl Collector {
    pub fn new(entity_repo: Arc<dyn EntityRepository>, known_kinds: impl IntoIterator<Item = ObjectType>) -> Self {
        Self { entity_repo, known_kinds: known_kinds.into_iter().collect() }
    }

    /// Drain `rx` until the channel closes or shutdown is triggered,
    /// handling exactly one event at a time.
    pub async fn run(&self, mut rx: mpsc::Receiver<CollectorEvent>, mut shutdown: Shutdown) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    tracing::info!("collector shutting down");
                    return;
                }
                event = rx.recv() => {
                    match event {
                        Some(event) => self.handle(event).await,
                        None => return,
                    }
                }
            }
        }
    }

    async fn handle(&self, event: CollectorEvent) {
        let result = match event {
            CollectorEvent::Watch(evt) => self.handle_watch(evt).await,
            CollectorEvent::PollObject { data_source_id, object_type, generation_id, external_id, body, parent_ref } => {
                self.upsert_one(data_source_id, &object_type, generation_id, &external_id, body, parent_ref).await
            }
            CollectorEvent::PollCycleEnd { guard, object_types } => self.finish_poll_cycle(guard, object_types).await,
        };

        if let Err(err) = result {
            tracing::warn!(error = %err, "collector event dropped");
        }
    }

    async fn handle_watch(&self, evt: AsyncChangeEvent) -> Result<(), CollectorError> {
        if !self.known_kinds.contains(&evt.object_type) {
            tracing::warn!(object_type = %evt.object_type, "unknown object type, ignoring watch event");
            return Ok(());
        }

        // Watch-mode rows are not subject to generation-based sweep (spec.md
        // §4.1), so they are stamped with generation 0; only SyncComplete
        // garbage-collects them.
        match evt.kind {
            CollectorEventKind::Added { object, parent_ref } | CollectorEventKind::Modified { object, parent_ref } => {
                let external_id = external_id_of(&object)?;
                self.upsert_one(evt.data_source_id, &evt.object_type, 0, &external_id, object, parent_ref).await
            }
            CollectorEventKind::Deleted { external_id } => self.delete_one(evt.data_source_id, &evt.object_type, &external_id).await,
            CollectorEventKind::SyncComplete { keys } => self.sync_complete(evt.data_source_id, &evt.object_type, keys).await,
        }
    }

    async fn resolve_parent(
        &self,
        data_source_id: DataSourceId,
        object_type: &ObjectType,
        parent_ref: Option<ParentRef>,
    ) -> Result<Option<EntityId>, CollectorError> {
        match parent_ref {
            None => Ok(None),
            Some(ParentRef::Id(id)) => Ok(Some(id)),
            Some(ParentRef::Name(name)) => {
                match self.entity_repo.find_by_external_id(object_type, data_source_id, &name).await? {
                    Some(parent) => Ok(Some(parent.id)),
                    None => Err(CollectorError::ParentNotFound(name)),
                }
            }
        }
    }

    async fn upsert_one(
        &self,
        data_source_id: DataSourceId,
        object_type: &ObjectType,
        generation_id: i64,
        external_id: &str,
        body: Value,
        parent_ref: Option<ParentRef>,
    ) -> Result<(), CollectorError> {
        let parent_id = match self.resolve_parent(data_source_id, object_type, parent_ref).await {
            Ok(parent_id) => parent_id,
            Err(CollectorError::ParentNotFound(name)) => {
                tracing::warn!(%name, object_type = %object_type, "parent not found by name, dropping event");
                return Ok(());
            }
            Err(other) => return Err(other),
        };

        let record = EntityRecord {
            id: derive_entity_id(data_source_id, object_type, external_id),
            object_type: object_type.clone(),
            data_source_id,
            generation_id,
            external_id: external_id.to_string(),
            parent_id,
            body,
            created_at: Utc::now(),
        };

        let mut tx = self.entity_repo.begin().await?;
        persist_with_change_event(&mut *tx, &record, |r| r.body.clone()).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_one(&self, data_source_id: DataSourceId, object_type: &ObjectType, external_id: &str) -> Result<(), CollectorError> {
        let Some(existing) = self.entity_repo.find_by_external_id(object_type, data_source_id, external_id).await? else {
            return Ok(());
        };
        self.delete_cascade(data_source_id, object_type, existing.id).await
    }

    /// Delete `id` and, recursively, every entity that references it as a
    /// parent, each in its own transaction (spec.md §4.2: "deletion of a
    /// parent fans out to deletion of all dependent children ... in
    /// separate transactions, one change-log entry per child").
    ///
    /// Boxed explicitly because recursive `async fn`s don't have a
    /// compile-time-sized `Future`.
    fn delete_cascade<'a>(
        &'a self,
        data_source_id: DataSourceId,
        object_type: &'a ObjectType,
        id: EntityId,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), CollectorError>> + Send + 'a>> {
        Box::pin(async move {
            let children = self.entity_repo.list_children(id).await?;

            let mut tx = self.entity_repo.begin().await?;
            delete_with_change_event(&mut *tx, object_type, id, data_source_id, |r| r.body.clone()).await?;
            tx.commit().await?;

            for child in children {
                self.delete_cascade(child.data_source_id, &child.object_type, child.id).await?;
            }
            Ok(())
        })
    }

    async fn sync_complete(&self, data_source_id: DataSourceId, object_type: &ObjectType, keys: Vec<String>) -> Result<(), CollectorError> {
        let known: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let present = self.entity_repo.list_keys(object_type, data_source_id).await?;

        for (id, external_id) in present {
            if !known.contains(external_id.as_str()) {
                self.delete_cascade(data_source_id, object_type, id).await?;
            }
        }
        Ok(())
    }

    async fn finish_poll_cycle(&self, guard: PollCycleGuard, object_types: Vec<ObjectType>) -> Result<(), CollectorError> {
        for object_type in &object_types {
            let stale = self.entity_repo.list_stale(object_type, guard.data_source_id(), guard.generation_id()).await?;
            for record in stale {
                self.delete_cascade(guard.data_source_id(), object_type, record.id).await?;
            }
        }
        guard.commit().await?;
        Ok(())
    }
}

/// Poll-sourced objects arrive as plain JSON; by convention the external id
/// lives under the `"id"` key, mirroring how `SyncComplete`'s `keys` are
/// external ids rather than internal row ids.
fn external_id_of(object: &Value) -> Result<String, CollectorError> {
    object
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CollectorError::MalformedObject("missing string \"id\" field".to_string()))
}
