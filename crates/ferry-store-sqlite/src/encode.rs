//! Conversions between target row values and SQLite values.
//!
//! Timestamps are stored as RFC 3339 strings; everything else maps onto the
//! matching SQLite storage class.

use chrono::{DateTime, Utc};
use ferry_core::row::Value;
use rusqlite::types::Value as SqlValue;

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_value(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Text(s) => SqlValue::Text(s.clone()),
    Value::Integer(n) => SqlValue::Integer(*n),
    Value::Real(n) => SqlValue::Real(*n),
    Value::Timestamp(dt) => SqlValue::Text(encode_dt(*dt)),
  }
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// One row as stored, with every column in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
  pub id:          i64,
  pub natural_key: String,
  pub values:      Vec<(String, SqlValue)>,
}

impl StoredRow {
  pub fn get(&self, column: &str) -> Option<&SqlValue> {
    self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
  }

  pub fn text(&self, column: &str) -> Option<&str> {
    match self.get(column)? {
      SqlValue::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn integer(&self, column: &str) -> Option<i64> {
    match self.get(column)? {
      SqlValue::Integer(n) => Some(*n),
      _ => None,
    }
  }

  pub fn timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
    self.text(column).map(decode_dt).transpose()
  }
}
