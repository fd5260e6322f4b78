//! The `GraphSource` trait: read-only access to the source graph store.
//!
//! Implemented by `ferry-graph`. Connection lifecycle belongs to the
//! implementation; the pipeline only ever asks for one page at a time.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{migration::SourceQuery, record::SourceRecord};

/// The domain scope every extraction is filtered by.
///
/// Matching is exact equality against the node's `domain` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFilter {
  pub domain: String,
}

impl DomainFilter {
  pub fn new(domain: impl Into<String>) -> Self {
    Self { domain: domain.into() }
  }

  pub fn matches(&self, domain: Option<&str>) -> bool {
    domain == Some(self.domain.as_str())
  }
}

/// One page of a query: `SKIP skip LIMIT limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub skip:  u64,
  pub limit: u64,
}

pub trait GraphSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Run `query` with `$domain`, `$skip` and `$limit` bound, returning at
  /// most `page.limit` records projected to `query.columns`.
  fn fetch_page<'a>(
    &'a self,
    query: &'a SourceQuery,
    filter: &'a DomainFilter,
    page: PageRequest,
  ) -> impl Future<Output = Result<Vec<SourceRecord>, Self::Error>> + Send + 'a;
}
