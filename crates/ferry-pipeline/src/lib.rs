//! The staged migration pipeline.
//!
//! Drives every entity kind through Extract → Stage → Load in dependency
//! order: [`GraphExtractor`] pages records out of a
//! [`GraphSource`](ferry_core::source::GraphSource), a
//! [`StagingStore`](ferry_staging::StagingStore) persists them as
//! checksummed shards, and [`RelationalLoader`] upserts the mapped rows into
//! a [`TargetStore`](ferry_core::store::TargetStore). [`Pipeline`] owns the
//! stage state machine and the resume rules.

pub mod cancel;
pub mod error;
pub mod extract;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod settings;

pub use cancel::Cancellation;
pub use error::{ConfigError, Error, ExtractionError, Result};
pub use extract::{Batch, BatchStream, GraphExtractor};
pub use loader::{FailureReason, LoadResult, RelationalLoader, ResolutionCache, RowFailure};
pub use pipeline::{Pipeline, RunOptions, RunPlan, StageState, StageSummary};
pub use report::{ExtractionReport, RunReport, StageReport};
pub use settings::{ConfigSources, MigrationConfig, PipelineSettings};

#[cfg(test)]
mod tests;
