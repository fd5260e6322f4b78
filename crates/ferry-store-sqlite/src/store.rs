//! [`SqliteTarget`]: the SQLite implementation of [`TargetStore`].

use std::{collections::HashMap, path::Path};

use ferry_core::{
  EntityKind,
  row::{ResolvedRow, RowOutcome},
  store::TargetStore,
};
use rusqlite::{OptionalExtension as _, types::Value as SqlValue};

use crate::{
  Result,
  encode::{StoredRow, encode_value},
  schema::SCHEMA,
};

// ─── Target ──────────────────────────────────────────────────────────────────

/// The relational target backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteTarget {
  conn: tokio_rusqlite::Connection,
}

impl SqliteTarget {
  /// Open (or create) a target database at `path` and create the schema.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let target = Self { conn };
    target.init_schema().await?;
    Ok(target)
  }

  /// Open an in-memory target, for tests and dry runs.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let target = Self { conn };
    target.init_schema().await?;
    Ok(target)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every row of `kind`'s table in surrogate-key order.
  pub async fn dump(&self, kind: EntityKind) -> Result<Vec<StoredRow>> {
    let table = kind.table();
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY id"))?;
        let names: Vec<String> = stmt
          .column_names()
          .into_iter()
          .map(str::to_owned)
          .collect();
        let rows = stmt
          .query_map([], |row| {
            let mut values = Vec::with_capacity(names.len().saturating_sub(2));
            for (i, name) in names.iter().enumerate().skip(2) {
              values.push((name.clone(), row.get::<_, SqlValue>(i)?));
            }
            Ok(StoredRow {
              id: row.get(0)?,
              natural_key: row.get(1)?,
              values,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  /// The stored row of `kind` with `natural_key`, if any.
  pub async fn find(&self, kind: EntityKind, natural_key: &str) -> Result<Option<StoredRow>> {
    Ok(
      self
        .dump(kind)
        .await?
        .into_iter()
        .find(|row| row.natural_key == natural_key),
    )
  }
}

/// Upsert one row by natural key, comparing against the stored values so
/// identical input leaves the row untouched.
fn upsert(conn: &rusqlite::Connection, table: &str, row: &ResolvedRow) -> rusqlite::Result<RowOutcome> {
  let names: Vec<&str> = row.columns.iter().map(|(c, _)| *c).collect();
  let values: Vec<SqlValue> = row.columns.iter().map(|(_, v)| encode_value(v)).collect();

  let projection: String = names.iter().map(|c| format!(", {c}")).collect();
  let existing = conn
    .prepare_cached(&format!("SELECT id{projection} FROM {table} WHERE natural_key = ?1"))?
    .query_row(rusqlite::params![row.natural_key], |r| {
      let id: i64 = r.get(0)?;
      let current = (1..=names.len())
        .map(|i| r.get::<_, SqlValue>(i))
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok((id, current))
    })
    .optional()?;

  match existing {
    None => {
      let columns: String = names.iter().map(|c| format!(", {c}")).collect();
      let placeholders: String = (2..=names.len() + 1).map(|i| format!(", ?{i}")).collect();
      let params = std::iter::once(SqlValue::Text(row.natural_key.clone())).chain(values);
      conn
        .prepare_cached(&format!(
          "INSERT INTO {table} (natural_key{columns}) VALUES (?1{placeholders})"
        ))?
        .execute(rusqlite::params_from_iter(params))?;
      Ok(RowOutcome::Inserted(conn.last_insert_rowid()))
    }
    Some((id, current)) if current == values => Ok(RowOutcome::Unchanged(id)),
    Some((id, _)) => {
      let assignments = names
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{c} = ?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
      let params = std::iter::once(SqlValue::Integer(id)).chain(values);
      conn
        .prepare_cached(&format!("UPDATE {table} SET {assignments} WHERE id = ?1"))?
        .execute(rusqlite::params_from_iter(params))?;
      Ok(RowOutcome::Updated(id))
    }
  }
}

// ─── TargetStore impl ────────────────────────────────────────────────────────

impl TargetStore for SqliteTarget {
  type Error = crate::Error;

  async fn apply_batch(&self, kind: EntityKind, rows: Vec<ResolvedRow>) -> Result<Vec<RowOutcome>> {
    if rows.is_empty() {
      return Ok(Vec::new());
    }
    let table = kind.table();
    let count = rows.len();

    let outcomes = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcomes = Vec::with_capacity(rows.len());
        for row in &rows {
          outcomes.push(upsert(&tx, table, row)?);
        }
        tx.commit()?;
        Ok(outcomes)
      })
      .await?;

    tracing::debug!(stage = %kind, rows = count, "committed batch");
    Ok(outcomes)
  }

  async fn surrogate_keys(&self, kind: EntityKind) -> Result<HashMap<String, i64>> {
    let table = kind.table();
    let keys = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!("SELECT natural_key, id FROM {table}"))?;
        let keys = stmt
          .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
          .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(keys)
      })
      .await?;
    Ok(keys)
  }

  async fn count(&self, kind: EntityKind) -> Result<u64> {
    let table = kind.table();
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }
}
