//! `DataSourceRepository` over Postgres (spec.md §4.1).

use async_trait::async_trait;
use bb8_postgres::{tokio_postgres::NoTls, PostgresConnectionManager};
use uuid::Uuid;

use notify_core::error::RepositoryError;
use notify_core::model::DataSource;
use notify_core::ports::DataSourceRepository;
use notify_proto::DataSourceId;

use crate::error::{map_db_error, map_pool_error};
use crate::schema::ensure_core_tables;

pub struct PgDataSourceRepository {
    pool: bb8::Pool<PostgresConnectionManager<NoTls>>,
}

impl PgDataSourceRepository {
    pub fn new(pool: bb8::Pool<PostgresConnectionManager<NoTls>>) -> Self { Self { pool } }
}

#[async_trait]
impl DataSourceRepository for PgDataSourceRepository {
    async fn get_or_create(&self, name: &str) -> Result<DataSource, RepositoryError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        ensure_core_tables(&client).await?;

        if let Some(row) = client.query_opt("SELECT * FROM data_source WHERE name = $1", &[&name]).await.map_err(map_db_error)? {
            return Ok(DataSource {
                id: DataSourceId::from_uuid(row.get("id")),
                name: row.get("name"),
                generation_id: row.get("generation_id"),
            });
        }

        let id = Uuid::new_v4();
        let row = client
            .query_one(
                "INSERT INTO data_source (id, name, generation_id) VALUES ($1, $2, 0) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING *",
                &[&id, &name],
            )
            .await
            .map_err(map_db_error)?;

        Ok(DataSource {
            id: DataSourceId::from_uuid(row.get("id")),
            name: row.get("name"),
            generation_id: row.get("generation_id"),
        })
    }

    async fn update_generation(&self, id: DataSourceId, generation_id: i64) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        client
            .execute("UPDATE data_source SET generation_id = $2 WHERE id = $1", &[&id.as_uuid(), &generation_id])
            .await
            .map_err(map_db_error)?;
        Ok(())
    }
}
