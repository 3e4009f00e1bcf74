//! In-memory representations of spec.md §3's persisted entities. Repository
//! ports (`ports.rs`) speak these types; the wire/DTO shapes in
//! `notify-proto` are kept separate since not every field here is meant to
//! cross a process boundary (e.g. `generation_id` is bookkeeping the
//! subscriber-facing projection must never see, per spec.md §4.3).

use chrono::{DateTime, Utc};
use serde_json::Value;

use notify_proto::{DataSourceId, EntityId, ObjectType, SubscriptionId};

#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub id: DataSourceId,
    pub name: String,
    pub generation_id: i64,
}

/// A persisted row of one entity kind's table (spec.md §3 "Entity").
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: EntityId,
    pub object_type: ObjectType,
    pub data_source_id: DataSourceId,
    pub generation_id: i64,
    pub external_id: String,
    pub parent_id: Option<EntityId>,
    pub body: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub consumer_id: Option<uuid::Uuid>,
    pub callback: String,
    pub filter: String,
    pub event_cursor: i64,
    pub created_at: DateTime<Utc>,
}

/// A new subscription's fields before an id/cursor/timestamp are assigned
/// (spec.md §4.5 "create").
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub consumer_id: Option<uuid::Uuid>,
    pub callback: String,
    pub filter: String,
}
