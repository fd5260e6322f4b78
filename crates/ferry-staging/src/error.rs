//! Error type for `ferry-staging`.

use std::path::PathBuf;

use ferry_core::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("manifest error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("{kind} shard {batch}: checksum mismatch (expected {expected}, found {actual})")]
  Checksum {
    kind:     EntityKind,
    batch:    u32,
    expected: String,
    actual:   String,
  },

  #[error("{kind}: staged with schema version {found}, this build reads version {expected}")]
  SchemaVersion {
    kind:     EntityKind,
    found:    u32,
    expected: u32,
  },

  #[error("{kind}: staged columns {found:?} do not match {expected:?}")]
  Columns {
    kind:     EntityKind,
    expected: Vec<String>,
    found:    Vec<String>,
  },

  #[error("{kind}: staged for domain {staged:?}, run requested {requested:?}")]
  DomainMismatch {
    kind:      EntityKind,
    staged:    String,
    requested: String,
  },

  #[error("{kind}: staged with batch size {staged}, run requested {requested}")]
  BatchSizeMismatch {
    kind:      EntityKind,
    staged:    usize,
    requested: usize,
  },

  #[error("{kind}: expected shard {expected} next, got {found}")]
  OutOfOrder {
    kind:     EntityKind,
    expected: u32,
    found:    u32,
  },

  #[error("{0}: extraction has not been started")]
  NotStarted(EntityKind),

  #[error("{kind}: shard file {file} is missing")]
  MissingShard { kind: EntityKind, file: String },

  #[error("corrupt shard: {0}")]
  Corrupt(String),

  #[error("staging directory is locked by another run ({holder}); remove {path:?} if that run is gone")]
  Locked { path: PathBuf, holder: String },
}

impl Error {
  /// Whether the staged data itself is untrustworthy. These errors are not
  /// fixed by retrying; the stage must be discarded and re-extracted.
  pub fn requires_reextract(&self) -> bool {
    matches!(
      self,
      Self::Checksum { .. }
        | Self::SchemaVersion { .. }
        | Self::Columns { .. }
        | Self::DomainMismatch { .. }
        | Self::BatchSizeMismatch { .. }
        | Self::MissingShard { .. }
        | Self::Corrupt(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
