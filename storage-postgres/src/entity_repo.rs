//! `EntityRepository` / `Transaction` over Postgres (spec.md §4.2, §4.3).
//!
//! Reads go through the pool directly. Writes open a dedicated connection
//! per transaction and drive it with raw `BEGIN`/`COMMIT`/`ROLLBACK`
//! statements rather than `tokio_postgres::Transaction<'_>` — the latter
//! borrows its `Client`, which can't be boxed into a `'static`-bound
//! `Box<dyn Transaction>` without the struct becoming self-referential.

use async_trait::async_trait;
use bb8_postgres::{tokio_postgres::NoTls, PostgresConnectionManager};
use chrono::{DateTime, Utc};
use tokio_postgres::Client;

use notify_core::error::RepositoryError;
use notify_core::model::EntityRecord;
use notify_core::ports::{EntityRepository, NewChangeLogEntry, RowWrite, Transaction};
use notify_proto::{ChangeLogEntry, ChangeLogEntryId, DataSourceId, EntityId, ObjectType};

use crate::error::{map_db_error, map_pool_error};
use crate::schema::{ensure_entity_table, entity_table_name};

fn row_to_entity(row: &tokio_postgres::Row, object_type: &ObjectType) -> EntityRecord {
    EntityRecord {
        id: EntityId::from_uuid(row.get("id")),
        object_type: object_type.clone(),
        data_source_id: DataSourceId::from_uuid(row.get("data_source_id")),
        generation_id: row.get("generation_id"),
        external_id: row.get("external_id"),
        parent_id: row.get::<_, Option<uuid::Uuid>>("parent_id").map(EntityId::from_uuid),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}

pub struct PgEntityRepository {
    pool: bb8::Pool<PostgresConnectionManager<NoTls>>,
    conn_string: String,
}

impl PgEntityRepository {
    pub fn new(pool: bb8::Pool<PostgresConnectionManager<NoTls>>, conn_string: String) -> Self { Self { pool, conn_string } }
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    async fn begin(&self) -> Result<Box<dyn Transaction>, RepositoryError> {
        let (client, connection) = tokio_postgres::connect(&self.conn_string, NoTls).await.map_err(map_db_error)?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres transaction connection closed with error");
            }
        });
        client.batch_execute("BEGIN").await.map_err(map_db_error)?;
        Ok(Box::new(PgTransaction { client }))
    }

    async fn list_keys(&self, kind: &ObjectType, data_source_id: DataSourceId) -> Result<Vec<(EntityId, String)>, RepositoryError> {
        let table = entity_table_name(kind)?;
        let client = self.pool.get().await.map_err(map_pool_error)?;
        ensure_entity_table(&client, &table).await?;

        let sql = format!("SELECT id, external_id FROM {table} WHERE data_source_id = $1");
        let rows = client.query(&sql, &[&data_source_id.as_uuid()]).await.map_err(map_db_error)?;
        Ok(rows.iter().map(|r| (EntityId::from_uuid(r.get("id")), r.get("external_id"))).collect())
    }

    async fn list_stale(&self, kind: &ObjectType, data_source_id: DataSourceId, current_generation: i64) -> Result<Vec<EntityRecord>, RepositoryError> {
        let table = entity_table_name(kind)?;
        let client = self.pool.get().await.map_err(map_pool_error)?;
        ensure_entity_table(&client, &table).await?;

        let sql = format!("SELECT * FROM {table} WHERE data_source_id = $1 AND generation_id < $2");
        let rows = client.query(&sql, &[&data_source_id.as_uuid(), &current_generation]).await.map_err(map_db_error)?;
        Ok(rows.iter().map(|r| row_to_entity(r, kind)).collect())
    }

    async fn find_by_external_id(&self, kind: &ObjectType, data_source_id: DataSourceId, external_id: &str) -> Result<Option<EntityRecord>, RepositoryError> {
        let table = entity_table_name(kind)?;
        let client = self.pool.get().await.map_err(map_pool_error)?;
        ensure_entity_table(&client, &table).await?;

        let sql = format!("SELECT * FROM {table} WHERE data_source_id = $1 AND external_id = $2");
        let row = client.query_opt(&sql, &[&data_source_id.as_uuid(), &external_id]).await.map_err(map_db_error)?;
        Ok(row.map(|r| row_to_entity(&r, kind)))
    }

    async fn list_children(&self, parent_id: EntityId) -> Result<Vec<EntityRecord>, RepositoryError> {
        // Children may live in any entity-kind table; `information_schema`
        // is consulted to enumerate the known entity tables rather than
        // keeping a separate registry in sync.
        let client = self.pool.get().await.map_err(map_pool_error)?;
        let table_rows = client
            .query("SELECT table_name FROM information_schema.tables WHERE table_name LIKE 'entity_%'", &[])
            .await
            .map_err(map_db_error)?;

        let mut children = Vec::new();
        for row in table_rows {
            let table: String = row.get("table_name");
            let kind = ObjectType::from(table.strip_prefix("entity_").unwrap_or(&table));
            let sql = format!("SELECT * FROM {table} WHERE parent_id = $1");
            let rows = client.query(&sql, &[&parent_id.as_uuid()]).await.map_err(map_db_error)?;
            children.extend(rows.iter().map(|r| row_to_entity(r, &kind)));
        }
        Ok(children)
    }
}

pub struct PgTransaction {
    client: Client,
}

impl PgTransaction {
    async fn ensure_table(&self, kind: &ObjectType) -> Result<String, RepositoryError> {
        let table = entity_table_name(kind)?;
        ensure_entity_table(&self.client, &table).await?;
        Ok(table)
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn get_entity(&mut self, kind: &ObjectType, id: EntityId) -> Result<Option<EntityRecord>, RepositoryError> {
        let table = self.ensure_table(kind).await?;
        let sql = format!("SELECT * FROM {table} WHERE id = $1");
        let row = self.client.query_opt(&sql, &[&id.as_uuid()]).await.map_err(map_db_error)?;
        Ok(row.map(|r| row_to_entity(&r, kind)))
    }

    async fn upsert_entity(&mut self, record: &EntityRecord) -> Result<RowWrite, RepositoryError> {
        let table = self.ensure_table(&record.object_type).await?;

        let sql = format!("SELECT * FROM {table} WHERE id = $1 FOR UPDATE");
        let existing = self.client.query_opt(&sql, &[&record.id.as_uuid()]).await.map_err(map_db_error)?;

        let Some(existing_row) = existing else {
            let insert = format!(
                "INSERT INTO {table} (id, data_source_id, generation_id, external_id, parent_id, body, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)"
            );
            self.client
                .execute(
                    &insert,
                    &[
                        &record.id.as_uuid(),
                        &record.data_source_id.as_uuid(),
                        &record.generation_id,
                        &record.external_id,
                        &record.parent_id.map(|p| p.as_uuid()),
                        &record.body,
                        &record.created_at,
                    ],
                )
                .await
                .map_err(map_db_error)?;
            return Ok(RowWrite::Inserted);
        };

        let previous = row_to_entity(&existing_row, &record.object_type);
        if previous.external_id == record.external_id && previous.parent_id == record.parent_id && previous.body == record.body {
            return Ok(RowWrite::Unchanged);
        }

        let update = format!("UPDATE {table} SET external_id = $2, parent_id = $3, body = $4, generation_id = $5 WHERE id = $1");
        self.client
            .execute(
                &update,
                &[&record.id.as_uuid(), &record.external_id, &record.parent_id.map(|p| p.as_uuid()), &record.body, &record.generation_id],
            )
            .await
            .map_err(map_db_error)?;

        Ok(RowWrite::Updated { previous })
    }

    async fn delete_entity(&mut self, kind: &ObjectType, id: EntityId) -> Result<Option<EntityRecord>, RepositoryError> {
        let table = self.ensure_table(kind).await?;
        let sql = format!("DELETE FROM {table} WHERE id = $1 RETURNING *");
        let row = self.client.query_opt(&sql, &[&id.as_uuid()]).await.map_err(map_db_error)?;
        Ok(row.map(|r| row_to_entity(&r, kind)))
    }

    async fn append_change_log(&mut self, entry: NewChangeLogEntry) -> Result<ChangeLogEntry, RepositoryError> {
        let id = ChangeLogEntryId::new();
        let created_at: DateTime<Utc> = entry.created_at;
        let row = self
            .client
            .query_one(
                "INSERT INTO change_log (id, object_type, object_id, parent_id, data_source_id, before_state, after_state, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING sequence_id",
                &[
                    &id.as_uuid(),
                    &entry.object_type.as_str(),
                    &entry.object_id.as_uuid(),
                    &entry.parent_id.map(|p| p.as_uuid()),
                    &entry.data_source_id.as_uuid(),
                    &entry.before_state,
                    &entry.after_state,
                    &created_at,
                ],
            )
            .await
            .map_err(map_db_error)?;

        self.client.batch_execute(&format!("NOTIFY {}", crate::listener::LEDGER_CHANNEL)).await.map_err(map_db_error)?;

        Ok(ChangeLogEntry {
            id,
            sequence_id: Some(row.get("sequence_id")),
            object_type: entry.object_type,
            object_id: entry.object_id,
            parent_id: entry.parent_id,
            data_source_id: entry.data_source_id,
            before_state: entry.before_state,
            after_state: entry.after_state,
            created_at,
        })
    }

    async fn list_stale(&mut self, kind: &ObjectType, data_source_id: DataSourceId, min_generation: i64) -> Result<Vec<EntityRecord>, RepositoryError> {
        let table = self.ensure_table(kind).await?;
        let sql = format!("SELECT * FROM {table} WHERE data_source_id = $1 AND generation_id < $2");
        let rows = self.client.query(&sql, &[&data_source_id.as_uuid(), &min_generation]).await.map_err(map_db_error)?;
        Ok(rows.iter().map(|r| row_to_entity(r, kind)).collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> { self.client.batch_execute("COMMIT").await.map_err(map_db_error) }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> { self.client.batch_execute("ROLLBACK").await.map_err(map_db_error) }
}
