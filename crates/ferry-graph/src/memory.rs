//! [`MemoryGraph`]: an in-process graph source.
//!
//! Holds pre-projected rows per entity kind and answers pages the way a
//! Cypher query would: filtered by domain, ordered by source id, then
//! `SKIP`/`LIMIT`. Counts every query and can be told to fail, which is what
//! the pipeline tests lean on.

use std::{
  collections::HashMap,
  sync::{
    Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
  },
};

use ferry_core::{
  EntityKind,
  migration::SourceQuery,
  record::SourceRecord,
  source::{DomainFilter, GraphSource, PageRequest},
};

use crate::GraphError;

#[derive(Debug, Clone)]
struct Node {
  source_id: u64,
  domain:    Option<String>,
  record:    SourceRecord,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
  after:     usize,
  remaining: usize,
}

#[derive(Debug, Default)]
pub struct MemoryGraph {
  nodes:    HashMap<EntityKind, Vec<Node>>,
  next_id:  u64,
  queries:  AtomicUsize,
  per_kind: Mutex<HashMap<EntityKind, usize>>,
  failures: Mutex<HashMap<EntityKind, Failure>>,
}

impl MemoryGraph {
  pub fn new() -> Self { Self::default() }

  /// Add a row for `kind` in `domain`. Source ids are assigned in insertion
  /// order.
  pub fn insert(&mut self, kind: EntityKind, domain: Option<&str>, record: SourceRecord) -> u64 {
    self.next_id += 1;
    let source_id = self.next_id;
    self.nodes.entry(kind).or_default().push(Node {
      source_id,
      domain: domain.map(str::to_owned),
      record,
    });
    source_id
  }

  /// Builder-style [`MemoryGraph::insert`].
  pub fn with(mut self, kind: EntityKind, domain: &str, record: SourceRecord) -> Self {
    self.insert(kind, Some(domain), record);
    self
  }

  /// Replace the record of an existing row, as if the source had changed.
  pub fn update(&mut self, kind: EntityKind, source_id: u64, record: SourceRecord) -> bool {
    let Some(node) = self
      .nodes
      .get_mut(&kind)
      .and_then(|nodes| nodes.iter_mut().find(|n| n.source_id == source_id))
    else {
      return false;
    };
    node.record = record;
    true
  }

  /// Total queries answered or failed so far.
  pub fn queries(&self) -> usize { self.queries.load(Ordering::SeqCst) }

  pub fn queries_for(&self, kind: EntityKind) -> usize {
    let counts = self.per_kind.lock().unwrap_or_else(PoisonError::into_inner);
    counts.get(&kind).copied().unwrap_or_default()
  }

  pub fn reset_queries(&self) {
    self.queries.store(0, Ordering::SeqCst);
    self.per_kind.lock().unwrap_or_else(PoisonError::into_inner).clear();
  }

  /// After `after` further queries for `kind` succeed, fail the next `times`.
  pub fn fail(&self, kind: EntityKind, after: usize, times: usize) {
    self
      .failures
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(kind, Failure { after, remaining: times });
  }

  pub fn heal(&self) {
    self.failures.lock().unwrap_or_else(PoisonError::into_inner).clear();
  }

  fn should_fail(&self, kind: EntityKind) -> bool {
    let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(failure) = failures.get_mut(&kind) else {
      return false;
    };
    if failure.after > 0 {
      failure.after -= 1;
      return false;
    }
    if failure.remaining == 0 {
      failures.remove(&kind);
      return false;
    }
    failure.remaining -= 1;
    true
  }

  fn page(&self, query: &SourceQuery, filter: &DomainFilter, page: PageRequest) -> Vec<SourceRecord> {
    let mut matching: Vec<&Node> = self
      .nodes
      .get(&query.kind)
      .map(|nodes| nodes.iter().filter(|n| filter.matches(n.domain.as_deref())).collect())
      .unwrap_or_default();
    matching.sort_by_key(|n| n.source_id);

    matching
      .into_iter()
      .skip(page.skip as usize)
      .take(page.limit as usize)
      .map(|n| n.record.clone().project(query.columns))
      .collect()
  }
}

impl GraphSource for MemoryGraph {
  type Error = GraphError;

  async fn fetch_page<'a>(
    &'a self,
    query: &'a SourceQuery,
    filter: &'a DomainFilter,
    page: PageRequest,
  ) -> Result<Vec<SourceRecord>, GraphError> {
    self.queries.fetch_add(1, Ordering::SeqCst);
    *self
      .per_kind
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(query.kind)
      .or_default() += 1;

    if self.should_fail(query.kind) {
      return Err(GraphError::Unavailable(format!(
        "injected failure for {}",
        query.kind
      )));
    }
    Ok(self.page(query, filter, page))
  }
}
