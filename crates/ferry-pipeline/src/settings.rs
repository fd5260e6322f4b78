//! Run configuration.
//!
//! Layered with the `config` crate, later sources winning:
//!
//! 1. `ferry.toml` in the working directory (or the file given with
//!    `--config`, which must then exist);
//! 2. `config/<env>.toml` when an environment is selected;
//! 3. `FERRY_*` environment variables, `__` separating nested keys
//!    (`FERRY_SOURCE__URI`);
//! 4. `--domain` on the command line.

use std::{path::PathBuf, time::Duration};

use ferry_core::source::DomainFilter;
use ferry_graph::Neo4jConfig;
use serde::Deserialize;

use crate::ConfigError;

const DEFAULT_FILE: &str = "ferry.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
  #[serde(default = "TargetConfig::default_path")]
  pub path: PathBuf,
}

impl TargetConfig {
  fn default_path() -> PathBuf { PathBuf::from("ferry.db") }
}

impl Default for TargetConfig {
  fn default() -> Self { Self { path: Self::default_path() } }
}

/// Everything a run needs, deserialised from the layered sources.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
  #[serde(default = "defaults::domain")]
  pub domain:           String,
  #[serde(default = "defaults::batch_size")]
  pub batch_size:       usize,
  /// Rows per target transaction; defaults to `batch_size`.
  #[serde(default)]
  pub commit_size:      Option<usize>,
  #[serde(default = "defaults::staging_dir")]
  pub staging_dir:      PathBuf,
  #[serde(default = "defaults::extract_retries")]
  pub extract_retries:  u32,
  #[serde(default = "defaults::retry_backoff_ms")]
  pub retry_backoff_ms: u64,
  #[serde(default)]
  pub source:           Neo4jConfig,
  #[serde(default)]
  pub target:           TargetConfig,
}

mod defaults {
  use std::path::PathBuf;

  pub fn domain() -> String { "ecd".to_owned() }

  pub fn batch_size() -> usize { 1000 }

  pub fn staging_dir() -> PathBuf { PathBuf::from("data") }

  pub fn extract_retries() -> u32 { 2 }

  pub fn retry_backoff_ms() -> u64 { 500 }
}

/// Where to read configuration from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
  pub file:   Option<PathBuf>,
  pub env:    Option<String>,
  pub domain: Option<String>,
}

impl MigrationConfig {
  pub fn load(sources: &ConfigSources) -> Result<Self, ConfigError> {
    let file = sources
      .file
      .clone()
      .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE));

    let mut builder = config::Config::builder()
      .add_source(config::File::from(file).required(sources.file.is_some()));

    if let Some(env) = &sources.env {
      if env.is_empty()
        || !env
          .chars()
          .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
      {
        return Err(ConfigError::InvalidEnv(env.clone()));
      }
      let path = PathBuf::from("config").join(format!("{env}.toml"));
      builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
      config::Environment::with_prefix("FERRY")
        .prefix_separator("_")
        .separator("__"),
    );

    if let Some(domain) = &sources.domain {
      builder = builder.set_override("domain", domain.clone())?;
    }

    let cfg: Self = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.batch_size == 0 {
      return Err(ConfigError::InvalidBatchSize);
    }
    if self.commit_size == Some(0) {
      return Err(ConfigError::InvalidCommitSize);
    }
    if self.domain.trim().is_empty() {
      return Err(ConfigError::EmptyDomain);
    }
    Ok(())
  }

  pub fn settings(&self) -> PipelineSettings {
    PipelineSettings {
      filter:          DomainFilter::new(self.domain.trim()),
      batch_size:      self.batch_size,
      commit_size:     self.commit_size.unwrap_or(self.batch_size),
      extract_retries: self.extract_retries,
      retry_backoff:   Duration::from_millis(self.retry_backoff_ms),
    }
  }
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// The validated subset of [`MigrationConfig`] the pipeline itself uses.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
  pub filter:          DomainFilter,
  pub batch_size:      usize,
  pub commit_size:     usize,
  pub extract_retries: u32,
  pub retry_backoff:   Duration,
}

impl PipelineSettings {
  pub fn new(domain: &str, batch_size: usize) -> Result<Self, ConfigError> {
    if batch_size == 0 {
      return Err(ConfigError::InvalidBatchSize);
    }
    if domain.trim().is_empty() {
      return Err(ConfigError::EmptyDomain);
    }
    Ok(Self {
      filter: DomainFilter::new(domain.trim()),
      batch_size,
      commit_size: batch_size,
      extract_retries: defaults::extract_retries(),
      retry_backoff: Duration::from_millis(defaults::retry_backoff_ms()),
    })
  }

  pub fn with_commit_size(mut self, commit_size: usize) -> Result<Self, ConfigError> {
    if commit_size == 0 {
      return Err(ConfigError::InvalidCommitSize);
    }
    self.commit_size = commit_size;
    Ok(self)
  }

  pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
    self.extract_retries = retries;
    self.retry_backoff = backoff;
    self
  }
}
