//! Postgres-backed adapters implementing `notify_core::ports` (spec.md §6).
//!
//! `Postgres::connect` builds one pool, shared read-mostly by every repository;
//! writers that need a real transaction (`entity_repo::PgEntityRepository`)
//! open a dedicated connection instead, per the module doc there.

pub mod datasource_repo;
pub mod entity_repo;
pub mod error;
pub mod ledger_repo;
pub mod listener;
pub mod schema;
pub mod subscription_repo;

use std::time::Duration;

use bb8_postgres::{tokio_postgres::NoTls, PostgresConnectionManager};

pub use datasource_repo::PgDataSourceRepository;
pub use entity_repo::PgEntityRepository;
pub use ledger_repo::PgLedgerRepository;
pub use listener::PgLedgerSignal;
pub use subscription_repo::PgSubscriptionRepository;

pub struct Postgres {
    pool: bb8::Pool<PostgresConnectionManager<NoTls>>,
    conn_string: String,
}

impl Postgres {
    pub async fn connect(conn_string: impl Into<String>) -> anyhow::Result<Self> {
        let conn_string = conn_string.into();
        let manager = PostgresConnectionManager::new_from_stringlike(conn_string.clone(), NoTls)?;
        let pool = bb8::Pool::builder().build(manager).await?;
        Ok(Self { pool, conn_string })
    }

    pub fn entity_repository(&self) -> PgEntityRepository { PgEntityRepository::new(self.pool.clone(), self.conn_string.clone()) }

    pub fn datasource_repository(&self) -> PgDataSourceRepository { PgDataSourceRepository::new(self.pool.clone()) }

    pub fn ledger_repository(&self) -> PgLedgerRepository { PgLedgerRepository::new(self.pool.clone()) }

    pub fn subscription_repository(&self) -> PgSubscriptionRepository { PgSubscriptionRepository::new(self.pool.clone()) }

    pub async fn ledger_signal(&self, catch_up_interval: Duration) -> anyhow::Result<PgLedgerSignal> {
        Ok(PgLedgerSignal::connect(&self.conn_string, catch_up_interval).await?)
    }
}
