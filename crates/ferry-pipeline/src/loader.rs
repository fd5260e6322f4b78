//! [`RelationalLoader`]: resolves references and upserts rows in commit
//! groups.

use std::collections::HashMap;

use ferry_core::{
  EntityKind, MappingError,
  row::{ResolvedRow, RowOutcome, TargetRow},
  store::TargetStore,
};

use crate::{Cancellation, Error, Result};

// ─── ResolutionCache ─────────────────────────────────────────────────────────

/// Natural key → surrogate key, per entity kind.
#[derive(Debug, Default)]
pub struct ResolutionCache {
  keys: HashMap<EntityKind, HashMap<String, i64>>,
}

impl ResolutionCache {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, kind: EntityKind, natural_key: &str) -> Option<i64> {
    self.keys.get(&kind)?.get(natural_key).copied()
  }

  pub fn insert(&mut self, kind: EntityKind, natural_key: String, surrogate: i64) {
    self.keys.entry(kind).or_default().insert(natural_key, surrogate);
  }

  pub fn extend(&mut self, kind: EntityKind, keys: HashMap<String, i64>) {
    self.keys.entry(kind).or_default().extend(keys);
  }

  /// Whether `kind` has been warmed or loaded in this run.
  pub fn knows(&self, kind: EntityKind) -> bool { self.keys.contains_key(&kind) }

}

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
  /// A referenced entity has no surrogate key yet.
  UnresolvedDependency { kind: EntityKind, natural_key: String },
  Mapping(MappingError),
  /// The row's commit group was rejected by the target and rolled back.
  BatchRolledBack(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
  /// Natural key of the failed row, when mapping got far enough to know it.
  pub natural_key: Option<String>,
  pub reason:      FailureReason,
}

impl RowFailure {
  pub fn mapping(error: MappingError) -> Self {
    Self {
      natural_key: None,
      reason:      FailureReason::Mapping(error),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
  pub inserted:  usize,
  pub updated:   usize,
  pub unchanged: usize,
  pub failed:    Vec<RowFailure>,
}

impl LoadResult {
  pub fn merge(&mut self, other: LoadResult) {
    self.inserted += other.inserted;
    self.updated += other.updated;
    self.unchanged += other.unchanged;
    self.failed.extend(other.failed);
  }

  pub fn unresolved(&self) -> usize {
    self
      .failed
      .iter()
      .filter(|f| matches!(f.reason, FailureReason::UnresolvedDependency { .. }))
      .count()
  }

  fn record(&mut self, outcome: RowOutcome) {
    match outcome {
      RowOutcome::Inserted(_) => self.inserted += 1,
      RowOutcome::Updated(_) => self.updated += 1,
      RowOutcome::Unchanged(_) => self.unchanged += 1,
    }
  }
}

// ─── Loader ──────────────────────────────────────────────────────────────────

pub struct RelationalLoader<'t, T> {
  target:      &'t T,
  cache:       ResolutionCache,
  commit_size: usize,
}

impl<'t, T: TargetStore> RelationalLoader<'t, T> {
  pub fn new(target: &'t T, commit_size: usize) -> Self {
    Self {
      target,
      cache: ResolutionCache::new(),
      commit_size: commit_size.max(1),
    }
  }

  pub fn cache(&self) -> &ResolutionCache { &self.cache }

  /// Populate the cache from the target for `kinds` not already known.
  pub async fn warm(&mut self, kinds: &[EntityKind]) -> Result<()> {
    for &kind in kinds {
      if self.cache.knows(kind) {
        continue;
      }
      let keys = self.target.surrogate_keys(kind).await.map_err(Error::target)?;
      tracing::debug!(stage = %kind, keys = keys.len(), "warmed resolution cache");
      self.cache.extend(kind, keys);
    }
    Ok(())
  }

  /// Resolve and upsert `rows` of `kind`.
  ///
  /// Row-level problems are reported in the result, never returned as
  /// errors. The only error is cancellation, observed before each commit
  /// group.
  pub async fn load(
    &mut self,
    kind: EntityKind,
    rows: Vec<TargetRow>,
    cancel: &Cancellation,
  ) -> Result<LoadResult> {
    let mut result = LoadResult::default();
    let mut resolved = Vec::with_capacity(rows.len());

    for row in rows {
      match self.resolve(row) {
        Ok(row) => resolved.push(row),
        Err(failure) => {
          tracing::warn!(stage = %kind, key = ?failure.natural_key, reason = ?failure.reason, "row not loaded");
          result.failed.push(failure);
        }
      }
    }

    let mut groups = resolved.into_iter().peekable();
    while groups.peek().is_some() {
      if cancel.is_cancelled() {
        return Err(Error::Cancelled(kind));
      }
      let group: Vec<ResolvedRow> = groups.by_ref().take(self.commit_size).collect();
      let keys: Vec<String> = group.iter().map(|r| r.natural_key.clone()).collect();

      match self.target.apply_batch(kind, group).await {
        Ok(outcomes) => {
          for (key, outcome) in keys.into_iter().zip(outcomes) {
            self.cache.insert(kind, key, outcome.surrogate());
            result.record(outcome);
          }
        }
        Err(e) => {
          tracing::warn!(stage = %kind, rows = keys.len(), "commit group rolled back: {e}");
          let reason = e.to_string();
          result.failed.extend(keys.into_iter().map(|key| RowFailure {
            natural_key: Some(key),
            reason:      FailureReason::BatchRolledBack(reason.clone()),
          }));
        }
      }
    }

    Ok(result)
  }

  fn resolve(&self, row: TargetRow) -> Result<ResolvedRow, RowFailure> {
    let mut surrogates = Vec::with_capacity(row.references.len());
    for reference in &row.references {
      let Some(key) = &reference.natural_key else {
        surrogates.push(None);
        continue;
      };
      match self.cache.get(reference.kind, key) {
        Some(id) => surrogates.push(Some(id)),
        None if reference.soft => {
          tracing::warn!(
            stage = %row.kind,
            key = %row.natural_key,
            "{} {key:?} not found; {} left null",
            reference.kind,
            reference.column,
          );
          surrogates.push(None);
        }
        None => {
          return Err(RowFailure {
            natural_key: Some(row.natural_key.clone()),
            reason:      FailureReason::UnresolvedDependency {
              kind:        reference.kind,
              natural_key: key.clone(),
            },
          });
        }
      }
    }
    Ok(row.resolve(surrogates))
  }
}
