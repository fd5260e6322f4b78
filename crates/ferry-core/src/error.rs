//! Error types for `ferry-core`.

use thiserror::Error;

use crate::entity::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown stage: {0:?}")]
  UnknownStage(String),

  #[error("mapping error: {0}")]
  Mapping(#[from] MappingError),
}

/// A source record could not be turned into target rows.
///
/// Mapping errors are record-scoped: the loader records the offending record
/// as failed and carries on with the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
  #[error("{kind} record is missing required field `{field}`")]
  MissingField { kind: EntityKind, field: &'static str },

  #[error("{kind} record has an invalid `{field}`: {reason}")]
  InvalidField {
    kind:   EntityKind,
    field:  &'static str,
    reason: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
