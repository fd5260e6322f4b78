//! Target rows: what the mapper produces and the loader upserts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;

// ─── Values ──────────────────────────────────────────────────────────────────

/// A column value in the target schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
  Null,
  Text(String),
  Integer(i64),
  Real(f64),
  Timestamp(DateTime<Utc>),
}

impl Value {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Value::Text(s.to_owned()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Value::Text(s) }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self { Value::Integer(n) }
}

impl From<f64> for Value {
  fn from(n: f64) -> Self { Value::Real(n) }
}

impl From<DateTime<Utc>> for Value {
  fn from(dt: DateTime<Utc>) -> Self { Value::Timestamp(dt) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self { v.map_or(Value::Null, Into::into) }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A foreign-key column whose value is another entity's surrogate key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
  /// Column in the referencing table.
  pub column:      &'static str,
  /// Kind of the referenced entity.
  pub kind:        EntityKind,
  /// Natural key of the referenced entity. `None` is a nullable reference
  /// that is written as `NULL` without resolution.
  pub natural_key: Option<String>,
  /// A key with no surrogate resolves to `NULL` instead of failing the row.
  pub soft:        bool,
}

/// A row produced by the mapper, before surrogate-key resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
  pub kind:        EntityKind,
  /// The idempotence key: rows are matched on it for upsert.
  pub natural_key: String,
  /// Non-identifying, non-reference columns.
  pub columns:     Vec<(&'static str, Value)>,
  pub references:  Vec<Reference>,
}

impl TargetRow {
  pub fn new(kind: EntityKind, natural_key: impl Into<String>) -> Self {
    Self {
      kind,
      natural_key: natural_key.into(),
      columns: Vec::new(),
      references: Vec::new(),
    }
  }

  pub fn column(mut self, name: &'static str, value: impl Into<Value>) -> Self {
    self.columns.push((name, value.into()));
    self
  }

  /// Add a required reference to `kind` by natural key.
  pub fn reference(mut self, column: &'static str, kind: EntityKind, key: impl Into<String>) -> Self {
    self.references.push(Reference {
      column,
      kind,
      natural_key: Some(key.into()),
      soft: false,
    });
    self
  }

  /// Add a nullable reference; `None` stays `NULL`.
  pub fn optional_reference(
    mut self,
    column: &'static str,
    kind: EntityKind,
    key: Option<impl Into<String>>,
  ) -> Self {
    self.references.push(Reference {
      column,
      kind,
      natural_key: key.map(Into::into),
      soft: false,
    });
    self
  }

  /// Add a reference that is written as `NULL` when `key` is absent or names
  /// an entity the target does not have.
  pub fn soft_reference(
    mut self,
    column: &'static str,
    kind: EntityKind,
    key: Option<impl Into<String>>,
  ) -> Self {
    self.references.push(Reference {
      column,
      kind,
      natural_key: key.map(Into::into),
      soft: true,
    });
    self
  }

  /// The value written for `name`, if this row sets it.
  pub fn value(&self, name: &str) -> Option<&Value> {
    self.columns.iter().find(|(c, _)| *c == name).map(|(_, v)| v)
  }

  /// Attach resolved surrogate keys, producing the row the store writes.
  ///
  /// `surrogates` must be in the same order as `self.references`.
  pub fn resolve(self, surrogates: Vec<Option<i64>>) -> ResolvedRow {
    let mut columns = self.columns;
    for (reference, id) in self.references.iter().zip(surrogates) {
      columns.push((reference.column, Value::from(id)));
    }
    ResolvedRow { natural_key: self.natural_key, columns }
  }
}

/// A row with every reference replaced by its surrogate key.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow {
  pub natural_key: String,
  pub columns:     Vec<(&'static str, Value)>,
}

/// What an upsert did to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
  /// The natural key was new; the row was inserted with this surrogate key.
  Inserted(i64),
  /// The row existed and non-identifying columns changed.
  Updated(i64),
  /// The row existed with identical values; nothing was written.
  Unchanged(i64),
}

impl RowOutcome {
  pub fn surrogate(self) -> i64 {
    match self {
      Self::Inserted(id) | Self::Updated(id) | Self::Unchanged(id) => id,
    }
  }
}
