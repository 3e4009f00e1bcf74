//! `LedgerRepository` over Postgres (spec.md §4.4, §4.6).

use async_trait::async_trait;
use bb8_postgres::{tokio_postgres::NoTls, PostgresConnectionManager};

use notify_core::error::RepositoryError;
use notify_core::ports::LedgerRepository;
use notify_proto::{ChangeLogEntry, ChangeLogEntryId, DataSourceId, EntityId, ObjectType};

use crate::error::{map_db_error, map_pool_error};
use crate::schema::ensure_core_tables;

pub struct PgLedgerRepository {
    pool: bb8::Pool<PostgresConnectionManager<NoTls>>,
}

impl PgLedgerRepository {
    pub fn new(pool: bb8::Pool<PostgresConnectionManager<NoTls>>) -> Self { Self { pool } }
}

fn row_to_entry(row: &tokio_postgres::Row) -> ChangeLogEntry {
    ChangeLogEntry {
        id: ChangeLogEntryId::from_uuid(row.get("id")),
        sequence_id: Some(row.get("sequence_id")),
        object_type: ObjectType::new(row.get::<_, String>("object_type")),
        object_id: EntityId::from_uuid(row.get("object_id")),
        parent_id: row.get::<_, Option<uuid::Uuid>>("parent_id").map(EntityId::from_uuid),
        data_source_id: DataSourceId::from_uuid(row.get("data_source_id")),
        before_state: row.get("before_state"),
        after_state: row.get("after_state"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn load_since(&self, after: i64) -> Result<Vec<ChangeLogEntry>, RepositoryError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        ensure_core_tables(&client).await?;

        let rows = client
            .query("SELECT * FROM change_log WHERE sequence_id > $1 ORDER BY sequence_id ASC", &[&after])
            .await
            .map_err(map_db_error)?;
        Ok(rows.iter().map(row_to_entry).collect())
    }

    async fn tail_sequence_id(&self) -> Result<i64, RepositoryError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        ensure_core_tables(&client).await?;

        let row = client.query_one("SELECT COALESCE(MAX(sequence_id), 0) AS tail FROM change_log", &[]).await.map_err(map_db_error)?;
        Ok(row.get("tail"))
    }

    async fn delete_if_safe(&self, sequence_id: i64, min_cursor: i64) -> Result<bool, RepositoryError> {
        if min_cursor < sequence_id {
            return Ok(false);
        }
        let client = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = client.execute("DELETE FROM change_log WHERE sequence_id = $1", &[&sequence_id]).await.map_err(map_db_error)?;
        Ok(deleted > 0)
    }
}
