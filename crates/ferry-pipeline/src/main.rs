//! `ferry`: staged graph → relational migration.
//!
//! # Usage
//!
//! ```
//! ferry run                       # every stage, resuming wherever the last run stopped
//! ferry run --from asset          # asset and everything after it
//! ferry run --stage space --reextract
//! ferry status
//! ferry discard building
//! ```
//!
//! Configuration is read from `ferry.toml` (or `--config`), then
//! `config/<env>.toml` when `--env` is given, then `FERRY_*` variables.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use ferry_core::EntityKind;
use ferry_graph::Neo4jHttpSource;
use ferry_pipeline::{
  Cancellation, ConfigSources, MigrationConfig, Pipeline, RunOptions, RunPlan, RunReport,
  StageSummary,
};
use ferry_staging::StagingStore;
use ferry_store_sqlite::SqliteTarget;
use tracing::{Instrument, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Staged graph to relational migration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Environment overlay, read from `config/<ENV>.toml`.
  #[arg(short, long, global = true)]
  env: Option<String>,

  /// Domain to migrate. Overrides configuration.
  #[arg(short, long, global = true)]
  domain: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run the pipeline.
  Run {
    /// Run this stage only.
    #[arg(long, value_name = "STAGE", value_parser = EntityKind::parse, conflicts_with = "from")]
    stage: Option<EntityKind>,

    /// Start at this stage and run through to the end.
    #[arg(long, value_name = "STAGE", value_parser = EntityKind::parse)]
    from: Option<EntityKind>,

    /// Discard staged output and query the source again.
    #[arg(long)]
    reextract: bool,

    /// Start even if earlier stages have not completed.
    #[arg(long)]
    force: bool,
  },

  /// Show staging and target progress for every stage.
  Status,

  /// Delete the staged output of a stage so the next run re-extracts it.
  Discard {
    #[arg(value_parser = EntityKind::parse)]
    stage: EntityKind,
  },

  /// List the stages in the order they run.
  Stages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if let Command::Stages = cli.command {
    print_stages();
    return Ok(());
  }

  let cfg = MigrationConfig::load(&ConfigSources {
    file:   cli.config,
    env:    cli.env,
    domain: cli.domain,
  })
  .context("failed to load configuration")?;

  let target_path = expand_tilde(&cfg.target.path);
  let target = SqliteTarget::open(&target_path)
    .await
    .with_context(|| format!("failed to open target database at {target_path:?}"))?;
  let source = Neo4jHttpSource::new(cfg.source.clone()).context("failed to build graph client")?;
  let staging = StagingStore::new(expand_tilde(&cfg.staging_dir));

  let cancel = Cancellation::new();
  let pipeline = Pipeline::new(&source, &target, staging, cfg.settings()).with_cancellation(cancel.clone());

  match cli.command {
    Command::Run {
      stage,
      from,
      reextract,
      force,
    } => {
      let plan = match (stage, from) {
        (Some(kind), _) => RunPlan::Only(kind),
        (None, Some(kind)) => RunPlan::From(kind),
        (None, None) => RunPlan::Full,
      };
      let options = RunOptions {
        plan,
        reextract,
        override_prerequisites: force,
      };

      tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
          tracing::warn!("interrupted; stopping after the current commit");
          cancel.cancel();
        }
      });

      let run_id = uuid::Uuid::new_v4();
      let span = tracing::info_span!("run", %run_id, domain = %cfg.domain);
      let report = pipeline
        .run(options)
        .instrument(span)
        .await
        .context("run did not start")?;

      print_report(&report);
      finish(&report)?;
    }
    Command::Status => {
      let summaries = pipeline.status().await.context("failed to read status")?;
      print_status(&summaries);
    }
    Command::Discard { stage } => {
      if pipeline.discard(stage).await.context("failed to discard")? {
        println!("discarded staged output for {stage}");
      } else {
        println!("nothing staged for {stage}");
      }
    }
    Command::Stages => {}
  }

  Ok(())
}

/// Exit status for a finished run.
fn finish(report: &RunReport) -> anyhow::Result<()> {
  if report.cancelled() {
    bail!("run cancelled; run again to resume");
  }
  if let Some(stage) = report.failed_stage() {
    bail!(
      "stage {} failed: {}\n{} row(s) failed, {} unresolved",
      stage.kind,
      stage.error.as_deref().unwrap_or("unknown error"),
      report.failed_rows(),
      report.unresolved_rows(),
    );
  }
  if report.failed_rows() > 0 {
    tracing::warn!(
      failed = report.failed_rows(),
      unresolved = report.unresolved_rows(),
      "run completed with rows that could not be loaded"
    );
  }
  Ok(())
}

// ─── Output ──────────────────────────────────────────────────────────────────

fn print_report(report: &RunReport) {
  println!(
    "{:<24} {:<10} {:>7} {:>9} {:>8} {:>8} {:>9} {:>7}",
    "stage", "state", "shards", "records", "inserted", "updated", "unchanged", "failed"
  );
  for stage in &report.stages {
    let mut state = format!("{:?}", stage.state);
    if stage.extraction.reused {
      state.push('*');
    }
    println!(
      "{:<24} {:<10} {:>7} {:>9} {:>8} {:>8} {:>9} {:>7}",
      stage.kind.stage_name(),
      state,
      stage.extraction.shards,
      stage.extraction.records,
      stage.load.inserted,
      stage.load.updated,
      stage.load.unchanged,
      stage.load.failed.len(),
    );
  }
  println!("{} source queries; * = staged output reused", report.queries());
}

fn print_status(summaries: &[StageSummary]) {
  println!(
    "{:<24} {:<11} {:>7} {:>7} {:>9} {:>11}",
    "stage", "staged", "shards", "loaded", "records", "target rows"
  );
  for s in summaries {
    let status = s
      .status
      .map(|status| format!("{status:?}").to_lowercase())
      .unwrap_or_else(|| "-".to_owned());
    println!(
      "{:<24} {:<11} {:>7} {:>7} {:>9} {:>11}",
      s.kind.stage_name(),
      status,
      s.shards,
      s.loaded_shards,
      s.records,
      s.target_rows,
    );
  }
}

fn print_stages() {
  for (i, kind) in EntityKind::STAGE_ORDER.iter().enumerate() {
    let deps: Vec<&str> = kind.depends_on().iter().map(|k| k.stage_name()).collect();
    if deps.is_empty() {
      println!("{:>2}. {kind}", i + 1);
    } else {
      println!("{:>2}. {kind} (after {})", i + 1, deps.join(", "));
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
