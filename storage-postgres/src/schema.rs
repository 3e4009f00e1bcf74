//! Table naming and on-demand DDL (spec.md §6: "one table per entity
//! kind, created on first observation"), grounded on the teacher's
//! `PostgresBucket::create_state_table` / `sane_name` pattern.

use notify_core::error::RepositoryError;
use notify_proto::ObjectType;
use tokio_postgres::Client;

use crate::error::map_db_error;

/// Same character allow-list as the teacher's `Postgres::sane_name`:
/// alphanumerics plus `_`, `.`, `:`. Object-type names come from collector
/// code, not end users, but this is cheap insurance against building an
/// invalid (or injectable) identifier.
pub fn sane_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | ':'))
}

pub fn entity_table_name(kind: &ObjectType) -> Result<String, RepositoryError> {
    let raw = kind.as_str();
    if !sane_name(raw) {
        return Err(RepositoryError::Fatal(anyhow::anyhow!("invalid object type name: {raw}")));
    }
    Ok(format!("entity_{raw}"))
}

pub async fn ensure_core_tables(client: &Client) -> Result<(), RepositoryError> {
    client
        .batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS data_source (
                id UUID PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                generation_id BIGINT NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS change_log (
                sequence_id BIGSERIAL PRIMARY KEY,
                id UUID NOT NULL,
                object_type TEXT NOT NULL,
                object_id UUID NOT NULL,
                parent_id UUID,
                data_source_id UUID NOT NULL,
                before_state JSONB,
                after_state JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );

            CREATE TABLE IF NOT EXISTS subscription (
                id UUID PRIMARY KEY,
                consumer_id UUID,
                callback TEXT UNIQUE NOT NULL,
                filter TEXT NOT NULL,
                event_cursor BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            "#,
        )
        .await
        .map_err(map_db_error)
}

/// Called the first time this process observes a given entity kind
/// (spec.md §6). Safe to call on every `begin()`/read since `IF NOT
/// EXISTS` makes it a no-op after the first call.
pub async fn ensure_entity_table(client: &Client, table: &str) -> Result<(), RepositoryError> {
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id UUID PRIMARY KEY,
            data_source_id UUID NOT NULL REFERENCES data_source(id),
            generation_id BIGINT NOT NULL,
            external_id TEXT NOT NULL,
            parent_id UUID,
            body JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (data_source_id, external_id)
        );
        "#
    );
    client.batch_execute(&ddl).await.map_err(map_db_error)
}
