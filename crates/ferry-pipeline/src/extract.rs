//! [`GraphExtractor`]: pages a migration's source query into batches.

use std::time::Duration;

use ferry_core::{
  EntityKind,
  migration::{Migration, SourceQuery},
  record::SourceRecord,
  source::{DomainFilter, GraphSource, PageRequest},
};

use crate::{ConfigError, ExtractionError};

/// One page of records, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
  pub index:   u32,
  pub records: Vec<SourceRecord>,
}

pub struct GraphExtractor<'s, S> {
  source:  &'s S,
  retries: u32,
  backoff: Duration,
}

impl<'s, S: GraphSource> GraphExtractor<'s, S> {
  pub fn new(source: &'s S) -> Self {
    Self {
      source,
      retries: 0,
      backoff: Duration::ZERO,
    }
  }

  /// Retry each failed page query up to `retries` times, sleeping
  /// `backoff * attempt` between attempts.
  pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
    self.retries = retries;
    self.backoff = backoff;
    self
  }

  /// Start a lazy stream over `migration`'s records in `filter`'s domain.
  pub fn extract(
    &self,
    migration: &dyn Migration,
    filter: &DomainFilter,
    batch_size: usize,
  ) -> Result<BatchStream<'s, S>, ConfigError> {
    if batch_size == 0 {
      return Err(ConfigError::InvalidBatchSize);
    }
    Ok(BatchStream {
      source: self.source,
      query: migration.source_query(),
      required: migration.required(),
      filter: filter.clone(),
      batch_size,
      retries: self.retries,
      backoff: self.backoff,
      next_index: 1,
      done: false,
      queries: 0,
    })
  }
}

// ─── BatchStream ─────────────────────────────────────────────────────────────

pub struct BatchStream<'s, S> {
  source:     &'s S,
  query:      SourceQuery,
  required:   &'static [&'static str],
  filter:     DomainFilter,
  batch_size: usize,
  retries:    u32,
  backoff:    Duration,
  next_index: u32,
  done:       bool,
  queries:    usize,
}

impl<S: GraphSource> BatchStream<'_, S> {
  /// Skip ahead so the next batch yielded is `index` (1-based).
  pub fn resume_at(mut self, index: u32) -> Self {
    self.next_index = index.max(1);
    self
  }

  pub fn kind(&self) -> EntityKind { self.query.kind }

  /// Source queries issued so far, retries included.
  pub fn queries(&self) -> usize { self.queries }

  /// The next batch, or `None` once the source is exhausted.
  ///
  /// A short page is yielded and ends the stream; an empty page ends it
  /// without yielding.
  pub async fn next_batch(&mut self) -> Result<Option<Batch>, ExtractionError> {
    if self.done {
      return Ok(None);
    }

    let index = self.next_index;
    let page = PageRequest {
      skip:  u64::from(index - 1) * self.batch_size as u64,
      limit: self.batch_size as u64,
    };
    let records = self.fetch(page).await?;

    if records.len() < self.batch_size {
      self.done = true;
    }
    if records.is_empty() {
      return Ok(None);
    }

    let records = records
      .into_iter()
      .map(|record| {
        let record = record.project(self.query.columns);
        match self.required.iter().copied().find(|field| record.get(field).is_none()) {
          Some(field) => Err(ExtractionError::MalformedRecord {
            kind: self.query.kind,
            batch: index,
            field,
          }),
          None => Ok(record),
        }
      })
      .collect::<Result<Vec<_>, _>>()?;

    self.next_index += 1;
    tracing::debug!(stage = %self.query.kind, batch = index, records = records.len(), "extracted batch");
    Ok(Some(Batch { index, records }))
  }

  async fn fetch(&mut self, page: PageRequest) -> Result<Vec<SourceRecord>, ExtractionError> {
    let mut attempt = 0;
    loop {
      attempt += 1;
      self.queries += 1;
      match self.source.fetch_page(&self.query, &self.filter, page).await {
        Ok(records) => return Ok(records),
        Err(e) if attempt <= self.retries => {
          tracing::warn!(
            stage = %self.query.kind,
            skip = page.skip,
            attempt,
            "source query failed, retrying: {e}"
          );
          tokio::time::sleep(self.backoff * attempt).await;
        }
        Err(e) => {
          return Err(ExtractionError::Source {
            kind:     self.query.kind,
            attempts: attempt,
            source:   Box::new(e),
          });
        }
      }
    }
  }
}
