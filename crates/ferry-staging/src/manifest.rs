//! Per-stage manifest: what was extracted, under which parameters, and how
//! far loading has progressed.

use chrono::{DateTime, Utc};
use ferry_core::EntityKind;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, SCHEMA_VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
  /// Shards are being written; the shard list may be incomplete.
  Extracting,
  /// Every shard is on disk. Nothing has been loaded yet.
  Staged,
  /// Loading has started; `loaded_shards` counts the committed shards.
  Loading,
  Loaded,
}

/// One shard file as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
  pub batch:  u32,
  pub file:   String,
  pub rows:   usize,
  pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageManifest {
  pub kind:           EntityKind,
  pub schema_version: u32,
  pub domain:         String,
  pub batch_size:     usize,
  pub columns:        Vec<String>,
  pub status:         StageStatus,
  pub shards:         Vec<ShardEntry>,
  /// Leading shards whose rows have been committed to the target.
  #[serde(default)]
  pub loaded_shards:  usize,
  pub started_at:     DateTime<Utc>,
  #[serde(default)]
  pub extracted_at:   Option<DateTime<Utc>>,
  #[serde(default)]
  pub loaded_at:      Option<DateTime<Utc>>,
}

impl StageManifest {
  pub fn new(kind: EntityKind, domain: &str, batch_size: usize, columns: &[&str]) -> Self {
    Self {
      kind,
      schema_version: SCHEMA_VERSION,
      domain: domain.to_owned(),
      batch_size,
      columns: columns.iter().map(|c| (*c).to_owned()).collect(),
      status: StageStatus::Extracting,
      shards: Vec::new(),
      loaded_shards: 0,
      started_at: Utc::now(),
      extracted_at: None,
      loaded_at: None,
    }
  }

  /// Extraction finished; shards may or may not have been loaded since.
  pub fn is_staged(&self) -> bool { self.status != StageStatus::Extracting }

  pub fn is_loaded(&self) -> bool { self.status == StageStatus::Loaded }

  /// Total records across all shards.
  pub fn records(&self) -> usize { self.shards.iter().map(|s| s.rows).sum() }

  /// The batch number the next shard written must carry.
  pub fn next_batch(&self) -> u32 { self.shards.len() as u32 + 1 }

  /// Reject staged data produced under different parameters than the ones
  /// this run would use.
  pub fn check_compatible(&self, domain: &str, batch_size: usize, columns: &[&str]) -> Result<()> {
    if self.schema_version != SCHEMA_VERSION {
      return Err(Error::SchemaVersion {
        kind:     self.kind,
        found:    self.schema_version,
        expected: SCHEMA_VERSION,
      });
    }
    if self.columns != columns {
      return Err(Error::Columns {
        kind:     self.kind,
        expected: columns.iter().map(|c| (*c).to_owned()).collect(),
        found:    self.columns.clone(),
      });
    }
    if self.domain != domain {
      return Err(Error::DomainMismatch {
        kind:      self.kind,
        staged:    self.domain.clone(),
        requested: domain.to_owned(),
      });
    }
    if self.batch_size != batch_size {
      return Err(Error::BatchSizeMismatch {
        kind:      self.kind,
        staged:    self.batch_size,
        requested: batch_size,
      });
    }
    Ok(())
  }
}
