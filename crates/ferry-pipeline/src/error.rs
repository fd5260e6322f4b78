//! Error types for `ferry-pipeline`.

use ferry_core::EntityKind;
use thiserror::Error;

use crate::pipeline::StageState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid configuration or invocation. Always raised before any I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("could not load configuration: {0}")]
  Load(#[from] config::ConfigError),

  #[error("batch size must be greater than zero")]
  InvalidBatchSize,

  #[error("commit size must be greater than zero")]
  InvalidCommitSize,

  #[error("domain must not be empty")]
  EmptyDomain,

  #[error("invalid environment name {0:?}")]
  InvalidEnv(String),

  #[error("invalid stage: {0}")]
  Stage(#[from] ferry_core::Error),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
  /// A record lacks one of its natural-key fields.
  #[error("{kind} batch {batch}: record is missing required field `{field}`")]
  MalformedRecord {
    kind:  EntityKind,
    batch: u32,
    field: &'static str,
  },

  #[error("{kind}: source query failed after {attempts} attempt(s): {source}")]
  Source {
    kind:     EntityKind,
    attempts: u32,
    #[source]
    source:   BoxError,
  },
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Extraction(#[from] ExtractionError),

  #[error("staging error: {0}")]
  Staging(#[from] ferry_staging::Error),

  #[error("target error: {0}")]
  Target(#[source] BoxError),

  #[error("cannot start at {stage}: prerequisite stages not completed: {}", list(.missing))]
  MissingDependency {
    stage:   EntityKind,
    missing: Vec<EntityKind>,
  },

  #[error("{stage}: illegal transition {from:?} -> {to:?}")]
  IllegalTransition {
    stage: EntityKind,
    from:  StageState,
    to:    StageState,
  },

  #[error("{0}: cancelled")]
  Cancelled(EntityKind),
}

impl Error {
  pub(crate) fn target<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Target(Box::new(e))
  }
}

fn list(kinds: &[EntityKind]) -> String {
  kinds.iter().map(|k| k.stage_name()).collect::<Vec<_>>().join(", ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
