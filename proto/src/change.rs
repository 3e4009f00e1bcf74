//! Change-log ledger DTOs (spec.md §3, §4.3, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ChangeLogEntryId, DataSourceId, EntityId};

/// Open set of entity kinds. Collectors may introduce new kinds without a
/// recompile of this crate (spec.md's entity list is illustrative, not
/// exhaustive).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectType(pub String);

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

impl From<&str> for ObjectType {
    fn from(s: &str) -> Self { Self(s.to_owned()) }
}

/// A single append to the persisted change ledger (spec.md §3 "ChangeLogEntry").
///
/// `before_state == None` iff the row did not previously exist in the
/// externally visible projection (I5); `after_state == None` iff the row
/// has been deleted (I5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: ChangeLogEntryId,
    /// Monotonic, gap-free within this table (I2). Assigned by the
    /// repository on append, so this field is `None` until persisted.
    pub sequence_id: Option<i64>,
    pub object_type: ObjectType,
    pub object_id: EntityId,
    pub parent_id: Option<EntityId>,
    pub data_source_id: DataSourceId,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
    pub created_at: DateTime<Utc>,
}
