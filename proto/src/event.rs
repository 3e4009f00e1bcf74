//! Collector-side async events (spec.md §4.2 "watch mode").

use serde_json::Value;

use crate::change::ObjectType;
use crate::ids::DataSourceId;

/// `AsyncChangeEvent{DataSourceID, EventType, Object, Keys}` from spec.md
/// §4.2. `Keys` is only populated for `SyncComplete`.
#[derive(Debug, Clone)]
pub struct AsyncChangeEvent {
    pub data_source_id: DataSourceId,
    pub object_type: ObjectType,
    pub kind: CollectorEventKind,
}

#[derive(Debug, Clone)]
pub enum CollectorEventKind {
    Added { object: Value, parent_ref: Option<ParentRef> },
    Modified { object: Value, parent_ref: Option<ParentRef> },
    Deleted { external_id: String },
    /// The watch stream was re-listed in full; `keys` is every external id
    /// currently known to the source for `object_type`. Anything of this
    /// type not present in `keys` must be deleted (spec.md §4.2, §9).
    SyncComplete { keys: Vec<String> },
}

/// A child entity may reference its parent either by primary id or by name
/// (spec.md §4.2 "tie-breaks"); the collector resolves a name reference to
/// an id before handing the event to the change log writer, dropping the
/// event (logged, not retried) if the parent cannot be found.
#[derive(Debug, Clone)]
pub enum ParentRef {
    Id(crate::ids::EntityId),
    Name(String),
}
