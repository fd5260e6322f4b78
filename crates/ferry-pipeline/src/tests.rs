//! End-to-end pipeline runs against `MemoryGraph`, an in-memory SQLite
//! target, and a temporary staging directory.

use std::{
  collections::HashMap,
  sync::atomic::{AtomicUsize, Ordering},
  time::Duration,
};

use ferry_core::{
  EntityKind,
  record::SourceRecord,
  row::{ResolvedRow, RowOutcome},
  store::TargetStore,
};
use ferry_graph::MemoryGraph;
use ferry_staging::{StageStatus, StagingStore};
use ferry_store_sqlite::SqliteTarget;
use tempfile::TempDir;

use crate::{
  Cancellation, Error, Pipeline, PipelineSettings, RunOptions, RunPlan, StageState,
};

const DOMAIN: &str = "ecd";

fn settings(batch_size: usize) -> PipelineSettings {
  PipelineSettings::new(DOMAIN, batch_size)
    .expect("valid settings")
    .with_retries(0, Duration::ZERO)
}

fn record(pairs: &[(&str, &str)]) -> SourceRecord {
  SourceRecord::from_pairs(pairs.iter().map(|&(column, value)| (column, Some(value))))
}

/// A small but complete site: every kind has at least one row and every
/// reference resolves.
fn site() -> MemoryGraph {
  use EntityKind::*;

  MemoryGraph::new()
    .with(Type, DOMAIN, record(&[
      ("parent_name", "Asset"),
      ("child_name", "Chiller"),
      ("child_template_name", "chiller-t"),
    ]))
    .with(Type, DOMAIN, record(&[
      ("parent_name", "Point"),
      ("child_name", "Temperature"),
      ("child_template_name", "temperature-t"),
    ]))
    .with(Client, DOMAIN, record(&[
      ("client_id", "acme"),
      ("client_name", "Acme"),
      ("domain", DOMAIN),
    ]))
    .with(Community, DOMAIN, record(&[
      ("community_id", "north"),
      ("community_name", "North"),
      ("client_id", "acme"),
      ("domain", DOMAIN),
    ]))
    .with(AssetType, DOMAIN, record(&[
      ("parent_name", "Asset"),
      ("child_name", "Chiller"),
      ("child_template_name", "chiller-t"),
    ]))
    .with(Subcommunity, DOMAIN, record(&[
      ("sub_community_id", "sc-1"),
      ("sub_community_name", "Campus"),
      ("community_id", "north"),
    ]))
    .with(Building, DOMAIN, record(&[
      ("building_id", "b-1"),
      ("building_name", "Main"),
      ("sub_community_id", "sc-1"),
    ]))
    .with(Space, DOMAIN, record(&[
      ("spaces_id", "s-1"),
      ("spaces_name", "Plant room"),
      ("building_id", "b-1"),
    ]))
    .with(Space, DOMAIN, record(&[
      ("spaces_id", "s-2"),
      ("spaces_name", "Roof"),
      ("building_id", "b-1"),
    ]))
    .with(Asset, DOMAIN, record(&[
      ("asset_id", "a-1"),
      ("asset_name", "Chiller 1"),
      ("asset_type", "chiller-t"),
      ("building_id", "b-1"),
    ]))
    .with(Asset, DOMAIN, record(&[
      ("asset_id", "a-2"),
      ("asset_name", "Untyped"),
      ("building_id", "b-1"),
    ]))
    .with(AssetSpaceLink, DOMAIN, record(&[
      ("asset_id", "a-1"),
      ("space_ids", "s-1;s-2"),
    ]))
    .with(Point, DOMAIN, record(&[
      ("data_point_id", "p-1"),
      ("point_name", "supply_temp"),
      ("asset_id", "a-1"),
    ]))
    .with(AssetPointLink, DOMAIN, record(&[
      ("asset_id", "a-1"),
      ("data_point_id", "p-1"),
    ]))
    .with(AssetTypePointLink, DOMAIN, record(&[
      ("asset_template_name", "chiller-t"),
      ("point_template_names", "Temperature"),
    ]))
    // Another domain's data is never extracted.
    .with(Client, "other", record(&[
      ("client_id", "stranger"),
      ("domain", "other"),
    ]))
}

fn types(n: usize) -> MemoryGraph {
  let mut graph = MemoryGraph::new();
  for i in 1..=n {
    let name = format!("t{i}");
    graph.insert(
      EntityKind::Type,
      Some(DOMAIN),
      record(&[("parent_name", "Asset"), ("child_name", name.as_str())]),
    );
  }
  graph
}

async fn dump_all(target: &SqliteTarget) -> HashMap<EntityKind, Vec<ferry_store_sqlite::StoredRow>> {
  let mut dump = HashMap::new();
  for kind in EntityKind::STAGE_ORDER {
    dump.insert(kind, target.dump(kind).await.unwrap());
  }
  dump
}

// ─── Full runs ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_loads_every_stage() {
  let graph = site();
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  let report = pipeline.run(RunOptions::default()).await.unwrap();

  assert!(report.is_success(), "{report:?}");
  assert_eq!(report.stages.len(), 12);
  assert_eq!(report.failed_rows(), 0);
  assert_eq!(report.queries(), 12);

  let expected = [
    (EntityKind::Type, 2),
    (EntityKind::Client, 1),
    (EntityKind::Community, 1),
    (EntityKind::AssetType, 1),
    (EntityKind::Subcommunity, 1),
    (EntityKind::Building, 1),
    (EntityKind::Space, 2),
    (EntityKind::Asset, 2),
    (EntityKind::AssetSpaceLink, 2),
    (EntityKind::Point, 1),
    (EntityKind::AssetPointLink, 1),
    (EntityKind::AssetTypePointLink, 1),
  ];
  for (kind, rows) in expected {
    assert_eq!(target.count(kind).await.unwrap(), rows, "{kind}");
  }

  let asset = target.find(EntityKind::Asset, "a-1").await.unwrap().unwrap();
  let building = target.find(EntityKind::Building, "b-1").await.unwrap().unwrap();
  let chiller = target.find(EntityKind::AssetType, "chiller-t").await.unwrap().unwrap();
  assert_eq!(asset.integer("building_ref"), Some(building.id));
  assert_eq!(asset.integer("asset_type_ref"), Some(chiller.id));

  let untyped = target.find(EntityKind::Asset, "a-2").await.unwrap().unwrap();
  assert_eq!(untyped.integer("asset_type_ref"), None);

  for summary in pipeline.status().await.unwrap() {
    assert_eq!(summary.status, Some(StageStatus::Loaded), "{}", summary.kind);
  }
}

#[tokio::test]
async fn rerunning_a_completed_stage_is_free_and_idempotent() {
  let graph = site();
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  pipeline.run(RunOptions::default()).await.unwrap();
  graph.reset_queries();

  let report = pipeline.run(RunOptions::new(RunPlan::Only(EntityKind::Type))).await.unwrap();
  let stage = report.stage(EntityKind::Type).unwrap();

  assert_eq!(stage.state, StageState::Completed);
  assert!(stage.extraction.reused);
  assert_eq!(stage.extraction.queries, 0);
  assert_eq!(graph.queries(), 0);
  assert_eq!(stage.load.inserted, 0);
  assert_eq!(stage.load.unchanged, 2);
}

#[tokio::test]
async fn full_rerun_writes_nothing_new() {
  let graph = site();
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  pipeline.run(RunOptions::default()).await.unwrap();
  let before = dump_all(&target).await;

  let again = pipeline.run(RunOptions::default()).await.unwrap();
  assert!(again.is_success());
  assert_eq!(again.inserted(), 0);
  assert_eq!(again.queries(), 0);
  assert_eq!(dump_all(&target).await, before);
}

#[tokio::test]
async fn reextract_picks_up_source_changes() {
  let mut graph = types(1);
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let plan = RunPlan::Only(EntityKind::Type);

  {
    let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));
    pipeline.run(RunOptions::new(plan)).await.unwrap();
  }

  graph.update(
    EntityKind::Type,
    1,
    record(&[
      ("parent_name", "Asset"),
      ("child_name", "t1"),
      ("child_display_name", "Renamed"),
    ]),
  );
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  // Without re-extraction the staged copy wins.
  let cached = pipeline.run(RunOptions::new(plan)).await.unwrap();
  assert_eq!(cached.stage(EntityKind::Type).unwrap().load.unchanged, 1);

  let fresh = pipeline
    .run(RunOptions {
      plan,
      reextract: true,
      ..RunOptions::default()
    })
    .await
    .unwrap();
  let stage = fresh.stage(EntityKind::Type).unwrap();
  assert!(!stage.extraction.reused);
  assert_eq!(stage.load.updated, 1);

  let row = target.find(EntityKind::Type, "t1").await.unwrap().unwrap();
  assert_eq!(row.text("display_name"), Some("Renamed"));
}

// ─── Dependencies ────────────────────────────────────────────────────────────

#[tokio::test]
async fn starting_late_without_prerequisites_does_nothing() {
  let graph = site();
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  let err = pipeline
    .run(RunOptions::new(RunPlan::From(EntityKind::Asset)))
    .await
    .unwrap_err();

  let Error::MissingDependency { stage, missing } = err else {
    panic!("expected a missing dependency, got {err:?}");
  };
  assert_eq!(stage, EntityKind::Asset);
  assert_eq!(missing, EntityKind::Asset.preceding());
  assert!(missing.contains(&EntityKind::Building));
  assert!(missing.contains(&EntityKind::Space));

  assert_eq!(graph.queries(), 0);
  for kind in EntityKind::STAGE_ORDER {
    assert_eq!(target.count(kind).await.unwrap(), 0);
    assert_eq!(pipeline.staging().manifest(kind).await.unwrap(), None);
  }
}

#[tokio::test]
async fn only_the_unfinished_prerequisites_are_reported() {
  let graph = site();
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  pipeline.run(RunOptions::new(RunPlan::Only(EntityKind::Type))).await.unwrap();
  pipeline.run(RunOptions::new(RunPlan::Only(EntityKind::Client))).await.unwrap();

  let err = pipeline
    .run(RunOptions::new(RunPlan::Only(EntityKind::AssetType)))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::MissingDependency { ref missing, .. } if missing == &[EntityKind::Community]
  ));
}

#[tokio::test]
async fn stopping_and_resuming_matches_an_uninterrupted_run() {
  let graph = site();

  let straight = SqliteTarget::open_in_memory().await.unwrap();
  let straight_dir = TempDir::new().unwrap();
  Pipeline::new(&graph, &straight, StagingStore::new(straight_dir.path()), settings(1))
    .run(RunOptions::default())
    .await
    .unwrap();

  let resumed = SqliteTarget::open_in_memory().await.unwrap();
  let resumed_dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &resumed, StagingStore::new(resumed_dir.path()), settings(1));
  for kind in EntityKind::Subcommunity.preceding() {
    let report = pipeline.run(RunOptions::new(RunPlan::Only(*kind))).await.unwrap();
    assert!(report.is_success());
  }
  let rest = pipeline
    .run(RunOptions::new(RunPlan::From(EntityKind::Subcommunity)))
    .await
    .unwrap();
  assert!(rest.is_success());
  assert_eq!(rest.stages.len(), 8);

  assert_eq!(dump_all(&resumed).await, dump_all(&straight).await);
}

#[tokio::test]
async fn unknown_client_leaves_exactly_one_unresolved_row() {
  let graph = site().with(EntityKind::Community, DOMAIN, record(&[
    ("community_id", "orphan"),
    ("client_id", "ghost"),
    ("domain", DOMAIN),
  ]));
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  let report = pipeline.run(RunOptions::default()).await.unwrap();

  assert!(report.is_success());
  assert_eq!(report.unresolved_rows(), 1);
  let community = report.stage(EntityKind::Community).unwrap();
  assert_eq!(community.load.inserted, 1);
  assert_eq!(community.load.unresolved(), 1);
  assert_eq!(community.load.failed[0].natural_key.as_deref(), Some("orphan"));
  assert_eq!(target.count(EntityKind::Community).await.unwrap(), 1);
}

#[tokio::test]
async fn quoted_template_names_resolve_through_every_stage() {
  let graph = site()
    .with(EntityKind::Type, DOMAIN, record(&[
      ("parent_name", "Asset"),
      ("child_name", "\"Pump\""),
    ]))
    .with(EntityKind::AssetType, DOMAIN, record(&[
      ("parent_name", "Asset"),
      ("child_name", "\"Pump\""),
      ("child_template_name", "\"pump-t\""),
    ]))
    .with(EntityKind::Asset, DOMAIN, record(&[
      ("asset_id", "a-3"),
      ("asset_type", "pump-t"),
      ("building_id", "\"b-1\""),
    ]));
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  let report = pipeline.run(RunOptions::default()).await.unwrap();

  assert!(report.is_success(), "{report:?}");
  assert_eq!(report.failed_rows(), 0, "{report:?}");
  let pump = target.find(EntityKind::Type, "Pump").await.unwrap().unwrap();
  let pump_t = target.find(EntityKind::AssetType, "pump-t").await.unwrap().unwrap();
  let asset = target.find(EntityKind::Asset, "a-3").await.unwrap().unwrap();
  assert_eq!(pump_t.integer("type_ref"), Some(pump.id));
  assert_eq!(asset.integer("asset_type_ref"), Some(pump_t.id));
}

#[tokio::test]
async fn asset_with_an_unknown_label_loads_without_a_type() {
  let graph = site().with(EntityKind::Asset, DOMAIN, record(&[
    ("asset_id", "a-3"),
    ("asset_type", "Mystery"),
    ("building_id", "b-1"),
  ]));
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  let report = pipeline.run(RunOptions::default()).await.unwrap();

  assert!(report.is_success());
  assert_eq!(report.failed_rows(), 0);
  assert_eq!(report.stage(EntityKind::Asset).unwrap().load.inserted, 3);
  let asset = target.find(EntityKind::Asset, "a-3").await.unwrap().unwrap();
  assert_eq!(asset.integer("asset_type_ref"), None);
  assert!(asset.integer("building_ref").is_some());
}

#[tokio::test]
async fn malformed_link_records_fail_alone() {
  let graph = site().with(EntityKind::AssetSpaceLink, DOMAIN, record(&[("asset_id", "a-2")]));
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  let report = pipeline.run(RunOptions::default()).await.unwrap();

  assert!(report.is_success());
  let links = report.stage(EntityKind::AssetSpaceLink).unwrap();
  assert_eq!(links.load.inserted, 2);
  assert_eq!(links.load.failed.len(), 1);
  assert!(matches!(
    links.load.failed[0].reason,
    crate::FailureReason::Mapping(_)
  ));
}

// ─── Staging ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn large_stage_is_sharded_by_batch_size() {
  let mut graph = MemoryGraph::new();
  for i in 1..=2500 {
    let id = format!("a-{i}");
    graph.insert(
      EntityKind::Asset,
      Some(DOMAIN),
      record(&[("asset_id", id.as_str()), ("building_id", "b-1")]),
    );
  }
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(1000));

  let report = pipeline
    .run(RunOptions {
      plan: RunPlan::Only(EntityKind::Asset),
      override_prerequisites: true,
      ..RunOptions::default()
    })
    .await
    .unwrap();

  let stage = report.stage(EntityKind::Asset).unwrap();
  assert_eq!(stage.state, StageState::Completed);
  assert_eq!(stage.extraction.shards, 3);
  assert_eq!(stage.extraction.records, 2500);
  // Buildings were never loaded, so nothing resolves.
  assert_eq!(stage.load.unresolved(), 2500);

  let manifest = pipeline.staging().manifest(EntityKind::Asset).await.unwrap().unwrap();
  let rows: Vec<usize> = manifest.shards.iter().map(|s| s.rows).collect();
  assert_eq!(rows, vec![1000, 1000, 500]);
  for shard in &manifest.shards {
    assert_eq!(shard.sha256.len(), 64);
    assert!(dir.path().join("asset").join(&shard.file).exists());
  }
}

#[tokio::test]
async fn empty_stage_completes_with_no_shards() {
  let graph = MemoryGraph::new();
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));

  let report = pipeline.run(RunOptions::new(RunPlan::Only(EntityKind::Type))).await.unwrap();
  let stage = report.stage(EntityKind::Type).unwrap();
  assert_eq!(stage.state, StageState::Completed);
  assert_eq!(stage.extraction.shards, 0);
  assert_eq!(stage.extraction.queries, 1);
}

#[tokio::test]
async fn failed_extraction_resumes_at_the_next_batch() {
  let graph = types(5);
  graph.fail(EntityKind::Type, 1, 1);
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(2));
  let plan = RunOptions::new(RunPlan::Only(EntityKind::Type));

  let failed = pipeline.run(plan).await.unwrap();
  let stage = failed.failed_stage().unwrap();
  assert_eq!(stage.kind, EntityKind::Type);
  assert!(stage.error.is_some());
  assert_eq!(target.count(EntityKind::Type).await.unwrap(), 0);

  let manifest = pipeline.staging().manifest(EntityKind::Type).await.unwrap().unwrap();
  assert_eq!(manifest.status, StageStatus::Extracting);
  assert_eq!(manifest.shards.len(), 1);

  graph.reset_queries();
  let resumed = pipeline.run(plan).await.unwrap();
  let stage = resumed.stage(EntityKind::Type).unwrap();
  assert_eq!(stage.state, StageState::Completed);
  assert_eq!(stage.extraction.resumed_at, Some(2));
  assert_eq!(stage.extraction.queries, 2);
  assert_eq!(stage.extraction.shards, 3);
  assert_eq!(target.count(EntityKind::Type).await.unwrap(), 5);
}

#[tokio::test]
async fn tampered_shard_fails_the_stage() {
  let graph = types(3);
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let pipeline = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10));
  let plan = RunOptions::new(RunPlan::Only(EntityKind::Type));

  pipeline.run(plan).await.unwrap();

  let shard = dir.path().join("type").join("data_1.csv");
  let body = std::fs::read_to_string(&shard).unwrap();
  std::fs::write(&shard, body.replace("t2", "tX")).unwrap();

  graph.reset_queries();
  let report = pipeline.run(plan).await.unwrap();
  let stage = report.failed_stage().unwrap();
  assert_eq!(stage.kind, EntityKind::Type);
  assert_eq!(stage.state, StageState::Failed);
  assert_eq!(graph.queries(), 0);
  assert!(!report.is_success());

  // A stage that depends on it may no longer start.
  let err = pipeline
    .run(RunOptions::new(RunPlan::Only(EntityKind::Client)))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::MissingDependency { .. }));

  // Discarding clears the way for a clean re-extraction.
  assert!(pipeline.discard(EntityKind::Type).await.unwrap());
  let report = pipeline.run(plan).await.unwrap();
  assert!(report.is_success());
}

#[tokio::test]
async fn a_second_run_is_refused_while_the_lock_is_held() {
  let graph = types(1);
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let staging = StagingStore::new(dir.path());
  let pipeline = Pipeline::new(&graph, &target, staging.clone(), settings(10));

  let held = staging.lock().unwrap();
  let err = pipeline.run(RunOptions::default()).await.unwrap_err();
  assert!(matches!(err, Error::Staging(ferry_staging::Error::Locked { .. })));
  assert_eq!(graph.queries(), 0);

  drop(held);
  assert!(pipeline.run(RunOptions::new(RunPlan::Only(EntityKind::Type))).await.unwrap().is_success());
}

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Trips a cancellation once `after` batches have been applied.
struct Tripwire {
  inner:   SqliteTarget,
  cancel:  Cancellation,
  after:   usize,
  applied: AtomicUsize,
}

impl TargetStore for Tripwire {
  type Error = ferry_store_sqlite::Error;

  async fn apply_batch(
    &self,
    kind: EntityKind,
    rows: Vec<ResolvedRow>,
  ) -> Result<Vec<RowOutcome>, Self::Error> {
    let outcomes = self.inner.apply_batch(kind, rows).await?;
    if self.applied.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
      self.cancel.cancel();
    }
    Ok(outcomes)
  }

  async fn surrogate_keys(&self, kind: EntityKind) -> Result<HashMap<String, i64>, Self::Error> {
    self.inner.surrogate_keys(kind).await
  }

  async fn count(&self, kind: EntityKind) -> Result<u64, Self::Error> {
    self.inner.count(kind).await
  }
}

#[tokio::test]
async fn cancelled_load_resumes_at_the_next_shard() {
  let graph = types(5);
  let inner = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let cancel = Cancellation::new();
  let tripwire = Tripwire {
    inner:   inner.clone(),
    cancel:  cancel.clone(),
    after:   1,
    applied: AtomicUsize::new(0),
  };
  let plan = RunOptions::new(RunPlan::Only(EntityKind::Type));

  let report = Pipeline::new(&graph, &tripwire, StagingStore::new(dir.path()), settings(2))
    .with_cancellation(cancel)
    .run(plan)
    .await
    .unwrap();

  assert!(report.cancelled());
  assert!(!report.is_success());
  let stage = report.stage(EntityKind::Type).unwrap();
  assert_eq!(stage.state, StageState::Loading);
  assert_eq!(stage.shards_loaded, 1);
  assert_eq!(inner.count(EntityKind::Type).await.unwrap(), 2);

  let staging = StagingStore::new(dir.path());
  let manifest = staging.manifest(EntityKind::Type).await.unwrap().unwrap();
  assert_eq!(manifest.status, StageStatus::Loading);
  assert_eq!(manifest.loaded_shards, 1);

  graph.reset_queries();
  let resumed = Pipeline::new(&graph, &inner, staging, settings(2))
    .run(plan)
    .await
    .unwrap();
  let stage = resumed.stage(EntityKind::Type).unwrap();
  assert_eq!(stage.state, StageState::Completed);
  assert!(stage.extraction.reused);
  assert_eq!(graph.queries(), 0);
  assert_eq!(stage.shards_loaded, 2);
  assert_eq!(stage.load.inserted, 3);
  assert_eq!(inner.count(EntityKind::Type).await.unwrap(), 5);
}

#[tokio::test]
async fn cancellation_before_the_run_stops_at_the_first_stage() {
  let graph = site();
  let target = SqliteTarget::open_in_memory().await.unwrap();
  let dir = TempDir::new().unwrap();
  let cancel = Cancellation::new();
  cancel.cancel();

  let report = Pipeline::new(&graph, &target, StagingStore::new(dir.path()), settings(10))
    .with_cancellation(cancel)
    .run(RunOptions::default())
    .await
    .unwrap();

  assert_eq!(report.stages.len(), 1);
  assert!(report.cancelled());
  assert_eq!(graph.queries(), 0);
}
