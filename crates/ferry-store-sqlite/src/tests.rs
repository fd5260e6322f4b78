//! Integration tests for `SqliteTarget` against an in-memory database.

use ferry_core::{
  EntityKind,
  row::{ResolvedRow, RowOutcome, TargetRow, Value},
  store::TargetStore,
};
use rusqlite::types::Value as SqlValue;

use crate::SqliteTarget;

async fn target() -> SqliteTarget {
  SqliteTarget::open_in_memory()
    .await
    .expect("in-memory target")
}

fn type_row(name: &str, display: &str) -> ResolvedRow {
  TargetRow::new(EntityKind::Type, name)
    .column("name", name)
    .column("parent_name", "Equipment")
    .column("display_name", display)
    .column("template_name", None::<String>)
    .column("status", "ACTIVE")
    .resolve(Vec::new())
}

fn client_row(id: &str) -> ResolvedRow {
  TargetRow::new(EntityKind::Client, id)
    .column("name", format!("Client {id}"))
    .column("status", "ACTIVE")
    .column("ticket_prefix", id.to_uppercase())
    .column("ticket_start_index", 0_i64)
    .column("domain", "ecd")
    .resolve(Vec::new())
}

fn community_row(id: &str, client: Option<i64>) -> ResolvedRow {
  TargetRow::new(EntityKind::Community, id)
    .column("name", format!("Community {id}"))
    .column("status", "ACTIVE")
    .column("ticket_prefix", id.to_uppercase())
    .column("ticket_start_index", 0_i64)
    .column("domain", "ecd")
    .reference("client_ref", EntityKind::Client, "unused")
    .resolve(vec![client])
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_assigns_surrogate_keys() {
  let t = target().await;
  let outcomes = t
    .apply_batch(EntityKind::Type, vec![
      type_row("Chiller", "Chiller"),
      type_row("Pump", "Pump"),
    ])
    .await
    .unwrap();

  assert_eq!(outcomes, vec![RowOutcome::Inserted(1), RowOutcome::Inserted(2)]);
  assert_eq!(t.count(EntityKind::Type).await.unwrap(), 2);

  let keys = t.surrogate_keys(EntityKind::Type).await.unwrap();
  assert_eq!(keys.get("Chiller"), Some(&1));
  assert_eq!(keys.get("Pump"), Some(&2));
}

#[tokio::test]
async fn identical_rows_are_unchanged() {
  let t = target().await;
  t.apply_batch(EntityKind::Type, vec![type_row("Chiller", "Chiller")])
    .await
    .unwrap();

  let again = t
    .apply_batch(EntityKind::Type, vec![type_row("Chiller", "Chiller")])
    .await
    .unwrap();
  assert_eq!(again, vec![RowOutcome::Unchanged(1)]);
  assert_eq!(t.count(EntityKind::Type).await.unwrap(), 1);
}

#[tokio::test]
async fn changed_rows_update_in_place() {
  let t = target().await;
  t.apply_batch(EntityKind::Type, vec![type_row("Chiller", "Chiller")])
    .await
    .unwrap();

  let outcomes = t
    .apply_batch(EntityKind::Type, vec![type_row("Chiller", "Water Chiller")])
    .await
    .unwrap();
  assert_eq!(outcomes, vec![RowOutcome::Updated(1)]);

  let row = t.find(EntityKind::Type, "Chiller").await.unwrap().unwrap();
  assert_eq!(row.id, 1);
  assert_eq!(row.text("display_name"), Some("Water Chiller"));
  assert_eq!(row.get("template_name"), Some(&SqlValue::Null));
}

#[tokio::test]
async fn timestamps_compare_stably() {
  let t = target().await;
  let created = chrono::DateTime::from_timestamp(1_600_000_000, 0).unwrap();
  let row = || {
    TargetRow::new(EntityKind::Client, "c1")
      .column("status", "ACTIVE")
      .column("ticket_prefix", "C1")
      .column("ticket_start_index", 0_i64)
      .column("domain", "ecd")
      .column("created_on", Value::Timestamp(created))
      .resolve(Vec::new())
  };

  t.apply_batch(EntityKind::Client, vec![row()]).await.unwrap();
  let again = t.apply_batch(EntityKind::Client, vec![row()]).await.unwrap();
  assert_eq!(again, vec![RowOutcome::Unchanged(1)]);

  let stored = t.find(EntityKind::Client, "c1").await.unwrap().unwrap();
  assert_eq!(stored.timestamp("created_on").unwrap(), Some(created));
}

// ─── Transactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn foreign_key_violation_rolls_back_the_whole_batch() {
  let t = target().await;
  t.apply_batch(EntityKind::Client, vec![client_row("c1")])
    .await
    .unwrap();

  let result = t
    .apply_batch(EntityKind::Community, vec![
      community_row("m1", Some(1)),
      community_row("m2", Some(999)),
    ])
    .await;
  assert!(result.is_err());
  assert_eq!(t.count(EntityKind::Community).await.unwrap(), 0);

  let ok = t
    .apply_batch(EntityKind::Community, vec![community_row("m1", Some(1))])
    .await
    .unwrap();
  assert!(matches!(ok[0], RowOutcome::Inserted(_)));
  let stored = t.find(EntityKind::Community, "m1").await.unwrap().unwrap();
  assert_eq!(stored.integer("client_ref"), Some(1));
}

#[tokio::test]
async fn not_null_reference_is_rejected() {
  let t = target().await;
  let result = t
    .apply_batch(EntityKind::Community, vec![community_row("m1", None)])
    .await;
  assert!(result.is_err());
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
  let t = target().await;
  assert!(t.apply_batch(EntityKind::Asset, Vec::new()).await.unwrap().is_empty());
  assert!(t.dump(EntityKind::Asset).await.unwrap().is_empty());
}

#[tokio::test]
async fn file_backed_target_persists_across_opens() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("target.db");

  {
    let t = SqliteTarget::open(&path).await.unwrap();
    t.apply_batch(EntityKind::Type, vec![type_row("Chiller", "Chiller")])
      .await
      .unwrap();
  }

  let reopened = SqliteTarget::open(&path).await.unwrap();
  assert_eq!(reopened.count(EntityKind::Type).await.unwrap(), 1);
}
