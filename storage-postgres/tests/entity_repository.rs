mod common;

use chrono::Utc;
use serde_json::json;

use notify_core::change_log_writer::{delete_with_change_event, persist_with_change_event};
use notify_core::model::EntityRecord;
use notify_core::ports::{DataSourceRepository, EntityRepository, RowWrite, Transaction};
use notify_proto::{DataSourceId, EntityId, ObjectType};

fn record(data_source_id: DataSourceId, external_id: &str, body: serde_json::Value) -> EntityRecord {
    EntityRecord {
        id: EntityId::new(),
        object_type: ObjectType::new("NodeCluster"),
        data_source_id,
        generation_id: 1,
        external_id: external_id.to_string(),
        parent_id: None,
        body,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn insert_then_unchanged_update_produces_exactly_one_change_log_entry() -> anyhow::Result<()> {
    let (_container, pg, _conn) = common::create_postgres_container().await?;
    let datasource_repo = pg.datasource_repository();
    let entity_repo = pg.entity_repository();

    let ds = datasource_repo.get_or_create("cluster-api").await?;

    let first = record(ds.id, "cluster-1", json!({"name": "cluster-1", "nodes": 3}));

    let mut tx = entity_repo.begin().await?;
    let outcome = persist_with_change_event(&mut *tx, &first, |r| r.body.clone()).await?;
    tx.commit().await?;
    assert!(outcome.is_some());

    // Re-observe the same row unchanged: no new ledger entry.
    let mut tx = entity_repo.begin().await?;
    let existing = tx.get_entity(&first.object_type, first.id).await?.expect("row exists");
    let replay = EntityRecord { body: existing.body.clone(), ..first.clone() };
    let outcome = persist_with_change_event(&mut *tx, &replay, |r| r.body.clone()).await?;
    tx.commit().await?;
    assert!(outcome.is_none());

    Ok(())
}

#[tokio::test]
async fn update_then_delete_each_emit_a_change_log_entry() -> anyhow::Result<()> {
    let (_container, pg, _conn) = common::create_postgres_container().await?;
    let datasource_repo = pg.datasource_repository();
    let entity_repo = pg.entity_repository();

    let ds = datasource_repo.get_or_create("cluster-api").await?;
    let mut current = record(ds.id, "cluster-2", json!({"name": "cluster-2", "nodes": 1}));

    let mut tx = entity_repo.begin().await?;
    persist_with_change_event(&mut *tx, &current, |r| r.body.clone()).await?;
    tx.commit().await?;

    current.body = json!({"name": "cluster-2", "nodes": 5});
    let mut tx = entity_repo.begin().await?;
    let updated = persist_with_change_event(&mut *tx, &current, |r| r.body.clone()).await?;
    tx.commit().await?;
    let updated = updated.expect("body changed, entry expected");
    assert_eq!(updated.before_state, Some(json!({"name": "cluster-2", "nodes": 1})));
    assert_eq!(updated.after_state, Some(json!({"name": "cluster-2", "nodes": 5})));

    let mut tx = entity_repo.begin().await?;
    let deleted = delete_with_change_event(&mut *tx, &current.object_type, current.id, ds.id, |r| r.body.clone()).await?;
    tx.commit().await?;
    let deleted = deleted.expect("row existed, entry expected");
    assert_eq!(deleted.before_state, Some(json!({"name": "cluster-2", "nodes": 5})));
    assert_eq!(deleted.after_state, None);

    Ok(())
}

#[tokio::test]
async fn key_order_differences_do_not_produce_a_change_log_entry() -> anyhow::Result<()> {
    let (_container, pg, _conn) = common::create_postgres_container().await?;
    let datasource_repo = pg.datasource_repository();
    let entity_repo = pg.entity_repository();

    let ds = datasource_repo.get_or_create("cluster-api").await?;
    let first = record(ds.id, "cluster-3", json!({"a": 1, "b": 2}));

    let mut tx = entity_repo.begin().await?;
    persist_with_change_event(&mut *tx, &first, |r| r.body.clone()).await?;
    tx.commit().await?;

    let reordered = EntityRecord { body: json!({"b": 2, "a": 1}), ..first.clone() };
    let mut tx = entity_repo.begin().await?;
    let outcome = persist_with_change_event(&mut *tx, &reordered, |r| r.body.clone()).await?;
    tx.commit().await?;
    assert!(outcome.is_none());

    Ok(())
}
