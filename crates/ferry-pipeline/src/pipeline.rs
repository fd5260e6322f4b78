//! [`Pipeline`]: drives each stage through Extract → Stage → Load in the
//! fixed dependency order.
//!
//! The staging directory is the only checkpoint. A fully staged stage is
//! never extracted again, a partial extraction resumes at its next
//! batch, and a partial load resumes at its first uncommitted shard.

use ferry_core::{
  EntityKind,
  mapper::EntityMapper,
  migration::{Migration, Registry},
  source::GraphSource,
  store::TargetStore,
};
use ferry_staging::{StageManifest, StageStatus, StagingStore};
use tracing::Instrument;

use crate::{
  Cancellation, Error, GraphExtractor, LoadResult, PipelineSettings, RelationalLoader, Result,
  RowFailure, RunReport, StageReport,
};

// ─── Stage state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
  Pending,
  Extracting,
  Staged,
  Loading,
  Completed,
  Failed,
}

impl StageState {
  pub fn can_advance(self, to: StageState) -> bool {
    use StageState::*;
    matches!(
      (self, to),
      (Pending, Extracting)
        | (Extracting, Staged | Failed)
        | (Staged, Loading)
        | (Loading, Completed | Failed)
    )
  }

  pub fn advance(&mut self, stage: EntityKind, to: StageState) -> Result<()> {
    if !self.can_advance(to) {
      return Err(Error::IllegalTransition {
        stage,
        from: *self,
        to,
      });
    }
    *self = to;
    Ok(())
  }
}

// ─── Run plan ────────────────────────────────────────────────────────────────

/// Which stages a run executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunPlan {
  #[default]
  Full,
  /// The named stage and every stage after it.
  From(EntityKind),
  Only(EntityKind),
}

impl RunPlan {
  pub fn stages(self) -> &'static [EntityKind] {
    match self {
      RunPlan::Full => EntityKind::Type.from_here(),
      RunPlan::From(kind) => kind.from_here(),
      RunPlan::Only(kind) => kind.single(),
    }
  }

  pub fn first(self) -> EntityKind {
    match self {
      RunPlan::Full => EntityKind::Type,
      RunPlan::From(kind) | RunPlan::Only(kind) => kind,
    }
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
  pub plan:                   RunPlan,
  /// Discard staged output for each planned stage before running it.
  pub reextract:              bool,
  /// Skip the prerequisite check. Rows referencing unloaded kinds will fail
  /// to resolve.
  pub override_prerequisites: bool,
}

impl RunOptions {
  pub fn new(plan: RunPlan) -> Self {
    Self {
      plan,
      ..Self::default()
    }
  }
}

/// One line of `ferry status`.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
  pub kind:          EntityKind,
  /// `None` when nothing has been staged.
  pub status:        Option<StageStatus>,
  pub shards:        usize,
  pub loaded_shards: usize,
  pub records:       usize,
  /// Rows currently in the target table.
  pub target_rows:   u64,
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline<'a, S, T> {
  source:   &'a S,
  target:   &'a T,
  staging:  StagingStore,
  settings: PipelineSettings,
  registry: Registry,
  cancel:   Cancellation,
}

impl<'a, S: GraphSource, T: TargetStore> Pipeline<'a, S, T> {
  pub fn new(source: &'a S, target: &'a T, staging: StagingStore, settings: PipelineSettings) -> Self {
    Self {
      source,
      target,
      staging,
      settings,
      registry: Registry::standard(),
      cancel: Cancellation::new(),
    }
  }

  pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn cancellation(&self) -> &Cancellation { &self.cancel }

  pub fn staging(&self) -> &StagingStore { &self.staging }

  /// Execute `options.plan`.
  ///
  /// Errors are returned only for problems that stop the run before any
  /// stage starts: a held lock, or missing prerequisites. A stage that fails
  /// or is cancelled ends the run early and is reported as such in the
  /// returned [`RunReport`].
  pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
    let first = options.plan.first();
    let _lock = self.staging.lock()?;

    if !options.override_prerequisites {
      let missing = self.missing_prerequisites(first).await;
      if !missing.is_empty() {
        return Err(Error::MissingDependency { stage: first, missing });
      }
    }

    let mut loader = RelationalLoader::new(self.target, self.settings.commit_size);
    loader.warm(first.preceding()).await?;

    let mut report = RunReport::default();
    for &kind in options.plan.stages() {
      let mut stage = StageReport::new(kind);
      let span = tracing::info_span!("stage", stage = %kind);
      let outcome = self
        .run_stage(kind, options.reextract, &mut loader, &mut stage)
        .instrument(span)
        .await;

      match outcome {
        Ok(()) => {
          if stage.load.unresolved() > 0 {
            tracing::warn!(
              stage = %kind,
              unresolved = stage.load.unresolved(),
              "stage completed with unresolved references"
            );
          }
          report.stages.push(stage);
        }
        Err(Error::Cancelled(_)) => {
          tracing::warn!(stage = %kind, "run cancelled; committed progress is kept");
          stage.cancelled = true;
          report.stages.push(stage);
          break;
        }
        Err(e) => {
          tracing::error!(stage = %kind, "stage failed: {e}");
          if stage.state.can_advance(StageState::Failed) {
            stage.state = StageState::Failed;
          }
          stage.error = Some(e.to_string());
          report.stages.push(stage);
          break;
        }
      }
    }

    Ok(report)
  }

  /// Stages before `first` that are not loaded with valid staged output.
  async fn missing_prerequisites(&self, first: EntityKind) -> Vec<EntityKind> {
    let mut missing = Vec::new();
    for &kind in first.preceding() {
      match self.staging.validate(kind).await {
        Ok(Some(manifest)) if manifest.is_loaded() => {}
        Ok(_) => missing.push(kind),
        Err(e) => {
          tracing::warn!(stage = %kind, "staged output is invalid: {e}");
          missing.push(kind);
        }
      }
    }
    missing
  }

  async fn run_stage(
    &self,
    kind: EntityKind,
    reextract: bool,
    loader: &mut RelationalLoader<'a, T>,
    stage: &mut StageReport,
  ) -> Result<()> {
    stage.state.advance(kind, StageState::Extracting)?;
    if reextract {
      self.staging.discard(kind).await?;
    }

    let migration = self.registry.get(kind);
    // Reused shards are verified as the load reads them.
    let manifest = match self.staging.staged_manifest(kind).await? {
      Some(manifest) => {
        manifest.check_compatible(
          &self.settings.filter.domain,
          self.settings.batch_size,
          migration.columns(),
        )?;
        tracing::info!(shards = manifest.shards.len(), "reusing staged output");
        stage.extraction.reused = true;
        manifest
      }
      None => self.extract(migration, stage).await?,
    };
    stage.extraction.shards = manifest.shards.len();
    stage.extraction.records = manifest.records();

    stage.state.advance(kind, StageState::Staged)?;
    stage.state.advance(kind, StageState::Loading)?;
    self.load(&manifest, loader, stage).await?;
    stage.state.advance(kind, StageState::Completed)?;

    tracing::info!(
      inserted = stage.load.inserted,
      updated = stage.load.updated,
      unchanged = stage.load.unchanged,
      failed = stage.load.failed.len(),
      "stage completed"
    );
    Ok(())
  }

  async fn extract(&self, migration: &dyn Migration, stage: &mut StageReport) -> Result<StageManifest> {
    let kind = migration.kind();
    let manifest = self
      .staging
      .begin(
        kind,
        migration.columns(),
        self.settings.batch_size,
        &self.settings.filter.domain,
      )
      .await?;

    let resume = manifest.next_batch();
    if resume > 1 {
      tracing::info!(batch = resume, "resuming partial extraction");
      stage.extraction.resumed_at = Some(resume);
    }

    let extractor = GraphExtractor::new(self.source)
      .with_retries(self.settings.extract_retries, self.settings.retry_backoff);
    let mut stream = extractor
      .extract(migration, &self.settings.filter, self.settings.batch_size)?
      .resume_at(resume);

    let extracted: Result<()> = async {
      loop {
        if self.cancel.is_cancelled() {
          return Err(Error::Cancelled(kind));
        }
        let Some(batch) = stream.next_batch().await? else {
          return Ok(());
        };
        self.staging.write(kind, batch.index, &batch.records).await?;
      }
    }
    .await;
    stage.extraction.queries = stream.queries();
    extracted?;

    let manifest = self.staging.finish_extraction(kind).await?;
    tracing::info!(
      shards = manifest.shards.len(),
      records = manifest.records(),
      queries = stage.extraction.queries,
      "extraction complete"
    );
    Ok(manifest)
  }

  async fn load(
    &self,
    manifest: &StageManifest,
    loader: &mut RelationalLoader<'a, T>,
    stage: &mut StageReport,
  ) -> Result<()> {
    let kind = manifest.kind;
    let skip = match manifest.status {
      StageStatus::Loading => manifest.loaded_shards,
      _ => 0,
    };
    if skip > 0 {
      tracing::info!(shard = skip + 1, "resuming partial load");
      // Rows committed before the interruption are needed by later stages.
      loader.warm(&[kind]).await?;
    }

    let mapper = EntityMapper::new(&self.registry);
    let mut reader = self.staging.read_from(kind, skip).await?;

    loop {
      if self.cancel.is_cancelled() {
        return Err(Error::Cancelled(kind));
      }
      let Some(shard) = reader.next_shard().await? else {
        break;
      };

      let mut result = LoadResult::default();
      let mut rows = Vec::with_capacity(shard.records.len());
      for record in &shard.records {
        match mapper.map(kind, record) {
          Ok(mapped) => rows.extend(mapped),
          Err(e) => {
            tracing::warn!(batch = shard.header.batch, "record not mapped: {e}");
            result.failed.push(RowFailure::mapping(e));
          }
        }
      }
      result.merge(loader.load(kind, rows, &self.cancel).await?);

      self.staging.mark_loading(kind, reader.position()).await?;
      stage.shards_loaded += 1;
      tracing::info!(
        batch = shard.header.batch,
        inserted = result.inserted,
        updated = result.updated,
        unchanged = result.unchanged,
        failed = result.failed.len(),
        "loaded shard"
      );
      stage.load.merge(result);
    }

    self.staging.mark_loaded(kind).await?;
    Ok(())
  }

  // ─── Operator commands ─────────────────────────────────────────────────────

  /// Staging and target state for every stage, in order.
  pub async fn status(&self) -> Result<Vec<StageSummary>> {
    let mut summaries = Vec::with_capacity(EntityKind::STAGE_ORDER.len());
    for kind in EntityKind::STAGE_ORDER {
      let manifest = self.staging.manifest(kind).await?;
      let target_rows = self.target.count(kind).await.map_err(Error::target)?;
      summaries.push(StageSummary {
        kind,
        status: manifest.as_ref().map(|m| m.status),
        shards: manifest.as_ref().map(|m| m.shards.len()).unwrap_or_default(),
        loaded_shards: manifest.as_ref().map(|m| m.loaded_shards).unwrap_or_default(),
        records: manifest.as_ref().map(StageManifest::records).unwrap_or_default(),
        target_rows,
      });
    }
    Ok(summaries)
  }

  /// Delete the staged output of `kind` so the next run re-extracts it.
  pub async fn discard(&self, kind: EntityKind) -> Result<bool> {
    let _lock = self.staging.lock()?;
    Ok(self.staging.discard(kind).await?)
  }
}
