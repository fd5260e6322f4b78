//! Source records: the raw, read-only snapshot of one graph row.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{MappingError, entity::EntityKind, mapper::clean};

/// One row returned by a source query, keyed by column name.
///
/// Empty and whitespace-only values are normalised to absent on insertion:
/// the staging format cannot tell `""` from a missing value, so doing it here
/// keeps a write/read round-trip exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
  values: BTreeMap<String, String>,
}

impl SourceRecord {
  pub fn new() -> Self { Self::default() }

  /// Build a record from `(column, value)` pairs.
  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: Into<String>,
    V: Into<String>,
  {
    let mut record = Self::new();
    for (column, value) in pairs {
      record.set(column, value);
    }
    record
  }

  /// Builder-style [`SourceRecord::set`].
  pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
    self.set(column, Some(value));
    self
  }

  pub fn set<V: Into<String>>(&mut self, column: impl Into<String>, value: Option<V>) {
    let column = column.into();
    match value.map(Into::into) {
      Some(v) if !v.trim().is_empty() => {
        self.values.insert(column, v);
      }
      _ => {
        self.values.remove(&column);
      }
    }
  }

  pub fn get(&self, column: &str) -> Option<&str> {
    self.values.get(column).map(String::as_str)
  }

  /// Return the value of `column`, or a [`MappingError::MissingField`].
  pub fn require(&self, kind: EntityKind, column: &'static str) -> Result<&str, MappingError> {
    self
      .get(column)
      .ok_or(MappingError::MissingField { kind, field: column })
  }

  /// The cleaned value of `column`, for use as a natural key or a reference
  /// to one. Keys on both sides of a reference go through here so they match.
  pub fn require_key(&self, kind: EntityKind, column: &'static str) -> Result<String, MappingError> {
    clean(self.get(column)).ok_or(MappingError::MissingField { kind, field: column })
  }

  /// Keep only `columns`, dropping anything else the source returned.
  pub fn project(mut self, columns: &[&str]) -> Self {
    self.values.retain(|k, _| columns.contains(&k.as_str()));
    self
  }

  /// The values of `columns` in order; absent values are `None`.
  pub fn values_for<'a>(&'a self, columns: &'a [&'a str]) -> impl Iterator<Item = Option<&'a str>> + 'a {
    columns.iter().map(|c| self.get(c))
  }

  pub fn len(&self) -> usize { self.values.len() }

  pub fn is_empty(&self) -> bool { self.values.is_empty() }
}
