//! The entity mapper and the field-normalisation helpers migrations share.
//!
//! Mapping is pure: no I/O, no clock, no randomness. The same record always
//! maps to the same rows, which is what makes re-loading staged data
//! idempotent.

use chrono::{DateTime, TimeZone, Utc};

use crate::{
  MappingError,
  entity::EntityKind,
  migration::Registry,
  record::SourceRecord,
  row::TargetRow,
};

/// Dispatches records to the migration registered for their kind.
#[derive(Clone, Copy)]
pub struct EntityMapper<'a> {
  registry: &'a Registry,
}

impl<'a> EntityMapper<'a> {
  pub fn new(registry: &'a Registry) -> Self { Self { registry } }

  /// Map one source record of `kind` to its target rows.
  pub fn map(&self, kind: EntityKind, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    self.registry.get(kind).map(record)
  }
}

// ─── Field helpers ───────────────────────────────────────────────────────────

/// Epoch values above this are milliseconds; below, seconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Trim whitespace and one layer of surrounding quotes. Blank → `None`.
pub fn clean(value: Option<&str>) -> Option<String> {
  let v = value?.trim();
  let v = v
    .strip_prefix('"')
    .and_then(|s| s.strip_suffix('"'))
    .or_else(|| v.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
    .unwrap_or(v)
    .trim();
  (!v.is_empty()).then(|| v.to_owned())
}

/// The record's status, defaulting to `ACTIVE`.
pub fn status(value: Option<&str>) -> String {
  clean(value).unwrap_or_else(|| "ACTIVE".to_owned())
}

/// Remove every space, as type names are stored (`"Gated Community"` →
/// `"GatedCommunity"`).
pub fn compact(value: Option<&str>) -> Option<String> {
  clean(value).map(|v| v.replace(' ', ""))
}

/// Convert an epoch in seconds or milliseconds to a UTC timestamp.
///
/// Anything that does not parse as an integer, and zero, yields `None`.
pub fn epoch_to_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
  let n: i64 = clean(value)?.parse().ok()?;
  if n == 0 {
    return None;
  }
  if n > MILLIS_THRESHOLD {
    Utc.timestamp_millis_opt(n).single()
  } else {
    Utc.timestamp_opt(n, 0).single()
  }
}

pub fn parse_f64(value: Option<&str>) -> Option<f64> {
  clean(value)?.parse().ok().filter(|f: &f64| f.is_finite())
}

pub fn parse_i64(value: Option<&str>) -> Option<i64> { clean(value)?.parse().ok() }

/// Split a `;`-separated list, cleaning each element, dropping blanks and
/// repeated entries while keeping first-seen order.
pub fn split_list(value: Option<&str>) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for item in value.unwrap_or_default().split(';') {
    if let Some(item) = clean(Some(item))
      && !out.contains(&item)
    {
      out.push(item);
    }
  }
  out
}

/// Natural key of a link row.
pub fn link_key(left: &str, right: &str) -> String { format!("{left}|{right}") }
