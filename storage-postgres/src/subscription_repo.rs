//! `SubscriptionRepository` over Postgres (spec.md §4.5).

use async_trait::async_trait;
use bb8_postgres::{tokio_postgres::NoTls, PostgresConnectionManager};
use uuid::Uuid;

use notify_core::error::RepositoryError;
use notify_core::model::{NewSubscription, Subscription};
use notify_core::ports::SubscriptionRepository;
use notify_proto::SubscriptionId;

use crate::error::{map_db_error, map_pool_error};
use crate::schema::ensure_core_tables;

pub struct PgSubscriptionRepository {
    pool: bb8::Pool<PostgresConnectionManager<NoTls>>,
}

impl PgSubscriptionRepository {
    pub fn new(pool: bb8::Pool<PostgresConnectionManager<NoTls>>) -> Self { Self { pool } }
}

fn row_to_subscription(row: &tokio_postgres::Row) -> Subscription {
    Subscription {
        id: SubscriptionId::from_uuid(row.get("id")),
        consumer_id: row.get("consumer_id"),
        callback: row.get("callback"),
        filter: row.get("filter"),
        event_cursor: row.get("event_cursor"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn create(&self, new_sub: NewSubscription, initial_cursor: i64) -> Result<Subscription, RepositoryError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        ensure_core_tables(&client).await?;

        let id = Uuid::new_v4();
        let row = client
            .query_one(
                "INSERT INTO subscription (id, consumer_id, callback, filter, event_cursor) VALUES ($1, $2, $3, $4, $5) RETURNING *",
                &[&id, &new_sub.consumer_id, &new_sub.callback, &new_sub.filter, &initial_cursor],
            )
            .await
            .map_err(map_db_error)?;
        Ok(row_to_subscription(&row))
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>, RepositoryError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        let row = client.query_opt("SELECT * FROM subscription WHERE id = $1", &[&id.as_uuid()]).await.map_err(map_db_error)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn list(&self) -> Result<Vec<Subscription>, RepositoryError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        ensure_core_tables(&client).await?;

        let rows = client.query("SELECT * FROM subscription", &[]).await.map_err(map_db_error)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn delete(&self, id: SubscriptionId) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        client.execute("DELETE FROM subscription WHERE id = $1", &[&id.as_uuid()]).await.map_err(map_db_error)?;
        Ok(())
    }

    async fn update_cursor(&self, id: SubscriptionId, cursor: i64) -> Result<(), RepositoryError> {
        let client = self.pool.get().await.map_err(map_pool_error)?;
        client.execute("UPDATE subscription SET event_cursor = $2 WHERE id = $1", &[&id.as_uuid(), &cursor]).await.map_err(map_db_error)?;
        Ok(())
    }
}
