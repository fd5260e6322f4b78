//! What a run did, stage by stage.

use ferry_core::EntityKind;

use crate::{LoadResult, StageState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
  /// Valid staged output was reused; the source was not queried.
  pub reused:     bool,
  /// Extraction continued a partial one at this batch.
  pub resumed_at: Option<u32>,
  /// Shards staged for the stage, including any from earlier runs.
  pub shards:     usize,
  pub records:    usize,
  pub queries:    usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
  pub kind:          EntityKind,
  pub state:         StageState,
  pub extraction:    ExtractionReport,
  pub load:          LoadResult,
  /// Shards loaded in this run.
  pub shards_loaded: usize,
  pub cancelled:     bool,
  pub error:         Option<String>,
}

impl StageReport {
  pub fn new(kind: EntityKind) -> Self {
    Self {
      kind,
      state: StageState::Pending,
      extraction: ExtractionReport::default(),
      load: LoadResult::default(),
      shards_loaded: 0,
      cancelled: false,
      error: None,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
  pub stages: Vec<StageReport>,
}

impl RunReport {
  pub fn stage(&self, kind: EntityKind) -> Option<&StageReport> {
    self.stages.iter().find(|s| s.kind == kind)
  }

  /// The stage that halted the run, if one failed.
  pub fn failed_stage(&self) -> Option<&StageReport> {
    self.stages.iter().find(|s| s.state == StageState::Failed)
  }

  pub fn cancelled(&self) -> bool { self.stages.iter().any(|s| s.cancelled) }

  /// Rows that could not be loaded, across all stages.
  pub fn failed_rows(&self) -> usize { self.stages.iter().map(|s| s.load.failed.len()).sum() }

  pub fn unresolved_rows(&self) -> usize { self.stages.iter().map(|s| s.load.unresolved()).sum() }

  pub fn queries(&self) -> usize { self.stages.iter().map(|s| s.extraction.queries).sum() }

  pub fn inserted(&self) -> usize { self.stages.iter().map(|s| s.load.inserted).sum() }

  /// Every planned stage completed. Failed rows are reported but do not
  /// make a run unsuccessful.
  pub fn is_success(&self) -> bool {
    !self.stages.is_empty() && self.stages.iter().all(|s| s.state == StageState::Completed)
  }
}
