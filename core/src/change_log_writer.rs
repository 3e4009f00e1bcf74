//! `PersistWithChangeEvent` / `DeleteWithChangeEvent` (spec.md §4.3).
//!
//! Both operations run inside a caller-provided [`Transaction`]: the entity
//! mutation and its change-log append are one atomic unit, so a crash
//! between them is impossible by construction (I1).

use chrono::Utc;
use serde_json::Value;

use notify_proto::{ChangeLogEntry, DataSourceId, EntityId, ObjectType};

use crate::error::RepositoryError;
use crate::model::EntityRecord;
use crate::ports::{NewChangeLogEntry, RowWrite, Transaction};
use crate::projection::json_eq;

/// Insert-or-update `record`, appending a change-log entry only if the
/// projected before/after representations actually differ (spec.md §4.3
/// steps 2-5).
pub async fn persist_with_change_event(
    tx: &mut dyn Transaction,
    record: &EntityRecord,
    project: impl Fn(&EntityRecord) -> Value,
) -> Result<Option<ChangeLogEntry>, RepositoryError> {
    let (before, after) = match tx.upsert_entity(record).await? {
        RowWrite::Unchanged => return Ok(None),
        RowWrite::Inserted => (None, Some(project(record))),
        RowWrite::Updated { previous } => (Some(project(&previous)), Some(project(record))),
    };

    if let (Some(b), Some(a)) = (&before, &after) {
        if json_eq(b, a) {
            return Ok(None);
        }
    }

    let entry = tx
        .append_change_log(NewChangeLogEntry {
            object_type: record.object_type.clone(),
            object_id: record.id,
            parent_id: record.parent_id,
            data_source_id: record.data_source_id,
            before_state: before,
            after_state: after,
            created_at: Utc::now(),
        })
        .await?;

    Ok(Some(entry))
}

/// Delete the row identified by `(kind, id)`, appending a change-log entry
/// with `after = null` only if a row actually existed.
pub async fn delete_with_change_event(
    tx: &mut dyn Transaction,
    kind: &ObjectType,
    id: EntityId,
    data_source_id: DataSourceId,
    project: impl Fn(&EntityRecord) -> Value,
) -> Result<Option<ChangeLogEntry>, RepositoryError> {
    let Some(previous) = tx.delete_entity(kind, id).await? else {
        return Ok(None);
    };

    let entry = tx
        .append_change_log(NewChangeLogEntry {
            object_type: kind.clone(),
            object_id: id,
            parent_id: previous.parent_id,
            data_source_id,
            before_state: Some(project(&previous)),
            after_state: None,
            created_at: Utc::now(),
        })
        .await?;

    Ok(Some(entry))
}
