//! Shard codec.
//!
//! A shard is one bounded batch of records for one entity kind:
//!
//! ```text
//! # ferry-shard v=1 kind=type batch=1 rows=2 sha256=<hex>
//! parent_name,child_name,child_display_name,child_template_name
//! Equipment,Chiller,Chiller Unit,ChillerTemplate
//! Equipment,Pump,,PumpTemplate
//! ```
//!
//! The first line is the shard header; its checksum is the SHA-256 of every
//! byte after it (the CSV header row and the records). Absent values are
//! written as empty fields. Pure and synchronous; file handling lives in
//! [`StagingStore`](crate::StagingStore).

use ferry_core::{EntityKind, record::SourceRecord};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Version of the shard and manifest layout. Bump on any format change; data
/// staged under another version is rejected rather than reinterpreted.
pub const SCHEMA_VERSION: u32 = 1;

const MAGIC: &str = "# ferry-shard";

// ─── Header ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardHeader {
  pub version: u32,
  pub kind:    EntityKind,
  pub batch:   u32,
  pub rows:    usize,
  pub sha256:  String,
}

impl ShardHeader {
  fn to_line(&self) -> String {
    format!(
      "{MAGIC} v={} kind={} batch={} rows={} sha256={}",
      self.version, self.kind, self.batch, self.rows, self.sha256
    )
  }

  fn parse(line: &str) -> Result<Self> {
    let rest = line
      .strip_prefix(MAGIC)
      .ok_or_else(|| Error::Corrupt(format!("not a shard header: {line:?}")))?;

    let mut version = None;
    let mut kind = None;
    let mut batch = None;
    let mut rows = None;
    let mut sha256 = None;

    for field in rest.split_whitespace() {
      let (key, value) = field
        .split_once('=')
        .ok_or_else(|| Error::Corrupt(format!("bad header field: {field:?}")))?;
      let bad = || Error::Corrupt(format!("bad header value: {field:?}"));
      match key {
        "v" => version = Some(value.parse().map_err(|_| bad())?),
        "kind" => kind = Some(EntityKind::parse(value).map_err(|_| bad())?),
        "batch" => batch = Some(value.parse().map_err(|_| bad())?),
        "rows" => rows = Some(value.parse().map_err(|_| bad())?),
        "sha256" => sha256 = Some(value.to_owned()),
        _ => {}
      }
    }

    let missing = |name: &str| Error::Corrupt(format!("shard header lacks `{name}`"));
    Ok(Self {
      version: version.ok_or_else(|| missing("v"))?,
      kind:    kind.ok_or_else(|| missing("kind"))?,
      batch:   batch.ok_or_else(|| missing("batch"))?,
      rows:    rows.ok_or_else(|| missing("rows"))?,
      sha256:  sha256.ok_or_else(|| missing("sha256"))?,
    })
  }
}

// ─── Shard ───────────────────────────────────────────────────────────────────

/// A decoded, verified shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
  pub header:  ShardHeader,
  pub records: Vec<SourceRecord>,
}

pub fn checksum(bytes: &[u8]) -> String { hex::encode(Sha256::digest(bytes)) }

/// Encode `records` as shard number `batch` of `kind`.
pub fn encode(
  kind: EntityKind,
  batch: u32,
  columns: &[&str],
  records: &[SourceRecord],
) -> Result<(ShardHeader, Vec<u8>)> {
  let mut writer = csv::Writer::from_writer(Vec::new());
  writer.write_record(columns)?;
  for record in records {
    writer.write_record(record.values_for(columns).map(Option::unwrap_or_default))?;
  }
  let body = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;

  let header = ShardHeader {
    version: SCHEMA_VERSION,
    kind,
    batch,
    rows: records.len(),
    sha256: checksum(&body),
  };

  let mut bytes = header.to_line().into_bytes();
  bytes.push(b'\n');
  bytes.extend_from_slice(&body);
  Ok((header, bytes))
}

/// Decode and verify a shard of `kind` whose CSV header must be `columns`.
pub fn decode(bytes: &[u8], kind: EntityKind, columns: &[&str]) -> Result<Shard> {
  let split = bytes
    .iter()
    .position(|b| *b == b'\n')
    .ok_or_else(|| Error::Corrupt(format!("{kind} shard has no header line")))?;
  let line = std::str::from_utf8(&bytes[..split])
    .map_err(|e| Error::Corrupt(format!("{kind} shard header is not utf-8: {e}")))?;
  let header = ShardHeader::parse(line.trim_end_matches('\r'))?;
  let body = &bytes[split + 1..];

  if header.version != SCHEMA_VERSION {
    return Err(Error::SchemaVersion {
      kind,
      found: header.version,
      expected: SCHEMA_VERSION,
    });
  }
  if header.kind != kind {
    return Err(Error::Corrupt(format!(
      "expected a {kind} shard, found a {} shard",
      header.kind
    )));
  }

  let actual = checksum(body);
  if actual != header.sha256 {
    return Err(Error::Checksum {
      kind,
      batch: header.batch,
      expected: header.sha256,
      actual,
    });
  }

  let mut reader = csv::ReaderBuilder::new()
    .has_headers(true)
    .from_reader(body);

  let found: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
  if found != columns {
    return Err(Error::Columns {
      kind,
      expected: columns.iter().map(|c| (*c).to_owned()).collect(),
      found,
    });
  }

  let records = reader
    .records()
    .map(|row| {
      let row = row?;
      Ok(SourceRecord::from_pairs(
        columns.iter().copied().zip(row.iter().map(Some)),
      ))
    })
    .collect::<Result<Vec<_>>>()?;

  if records.len() != header.rows {
    return Err(Error::Corrupt(format!(
      "{kind} shard {} declares {} rows but holds {}",
      header.batch,
      header.rows,
      records.len()
    )));
  }

  Ok(Shard { header, records })
}
