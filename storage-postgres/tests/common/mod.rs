//! Common utilities for Postgres adapter tests.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use notify_storage_postgres::Postgres;
use testcontainers::ContainerAsync;
use testcontainers_modules::{postgres, testcontainers::runners::AsyncRunner};
use tracing::Level;

#[ctor::ctor]
fn init_tracing() {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        tracing_subscriber::fmt().with_max_level(Level::from_str(&level).unwrap()).with_test_writer().init();
    } else {
        tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init();
    }
}

pub async fn create_postgres_container() -> Result<(ContainerAsync<postgres::Postgres>, Postgres, String)> {
    let container: ContainerAsync<postgres::Postgres> =
        postgres::Postgres::default().with_db_name("notify").with_user("postgres").with_password("postgres").start().await?;

    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let conn_string = format!("host={host} port={port} user=postgres password=postgres dbname=notify");

    let pg = Postgres::connect(conn_string.clone()).await?;
    Ok((container, pg, conn_string))
}

pub fn catch_up_interval() -> Duration { Duration::from_millis(50) }
