//! The `TargetStore` trait: transactional writes to the relational target.
//!
//! The trait is implemented by storage backends (e.g. `ferry-store-sqlite`).
//! The loader depends on this abstraction, not on any concrete backend.

use std::{collections::HashMap, future::Future};

use crate::{
  entity::EntityKind,
  row::{ResolvedRow, RowOutcome},
};

/// Abstraction over the relational target.
///
/// Every table has a surrogate `id` and a unique `natural_key`. Writes are
/// upserts keyed on `natural_key`; nothing is ever deleted.
pub trait TargetStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Upsert `rows` into the table for `kind` inside one transaction.
  ///
  /// Either every row is applied and one outcome per row is returned, in
  /// order, or the transaction is rolled back and an error is returned.
  fn apply_batch(
    &self,
    kind: EntityKind,
    rows: Vec<ResolvedRow>,
  ) -> impl Future<Output = Result<Vec<RowOutcome>, Self::Error>> + Send + '_;

  /// Every natural key already loaded for `kind`, with its surrogate key.
  fn surrogate_keys(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<HashMap<String, i64>, Self::Error>> + Send + '_;

  /// Number of rows loaded for `kind`.
  fn count(
    &self,
    kind: EntityKind,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
