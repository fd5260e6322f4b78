//! `StagingStore`: the on-disk shard sets and their manifests.

use std::path::{Path, PathBuf};

use chrono::Utc;
use ferry_core::{EntityKind, record::SourceRecord};
use tokio::{fs, io::AsyncWriteExt};

use crate::{
  Error, Result, Shard, StagingLock,
  manifest::{ShardEntry, StageManifest, StageStatus},
  shard,
};

const MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct StagingStore {
  root: PathBuf,
}

impl StagingStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Take the exclusive run lock on the staging directory.
  pub fn lock(&self) -> Result<StagingLock> { StagingLock::acquire(&self.root) }

  fn stage_dir(&self, kind: EntityKind) -> PathBuf { self.root.join(kind.stage_name()) }

  fn shard_file(batch: u32) -> String { format!("data_{batch}.csv") }

  // ─── Manifest ──────────────────────────────────────────────────────────────

  /// The stage's manifest, if extraction has ever started.
  pub async fn manifest(&self, kind: EntityKind) -> Result<Option<StageManifest>> {
    let path = self.stage_dir(kind).join(MANIFEST);
    let bytes = match fs::read(&path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };
    let manifest: StageManifest = serde_json::from_slice(&bytes)?;
    if manifest.kind != kind {
      return Err(Error::Corrupt(format!(
        "{} holds a manifest for {}",
        path.display(),
        manifest.kind
      )));
    }
    Ok(Some(manifest))
  }

  async fn save_manifest(&self, manifest: &StageManifest) -> Result<()> {
    let dir = self.stage_dir(manifest.kind);
    let bytes = serde_json::to_vec_pretty(manifest)?;
    write_atomic(&dir.join(MANIFEST), &bytes).await
  }

  async fn require_manifest(&self, kind: EntityKind) -> Result<StageManifest> {
    self.manifest(kind).await?.ok_or(Error::NotStarted(kind))
  }

  /// Start (or resume) extraction of `kind`.
  ///
  /// An existing manifest is returned as-is once it is confirmed to have been
  /// produced with the same columns, domain and batch size; a partially
  /// extracted stage then continues at [`StageManifest::next_batch`].
  pub async fn begin(
    &self,
    kind: EntityKind,
    columns: &[&str],
    batch_size: usize,
    domain: &str,
  ) -> Result<StageManifest> {
    if let Some(existing) = self.manifest(kind).await? {
      existing.check_compatible(domain, batch_size, columns)?;
      return Ok(existing);
    }

    fs::create_dir_all(self.stage_dir(kind)).await?;
    let manifest = StageManifest::new(kind, domain, batch_size, columns);
    self.save_manifest(&manifest).await?;
    tracing::debug!(stage = %kind, domain, batch_size, "began extraction");
    Ok(manifest)
  }

  /// Persist shard `batch` of `kind` and append it to the manifest.
  ///
  /// Batches must be written in sequence starting at 1. The shard file is
  /// renamed into place before the manifest names it, so a crash between the
  /// two leaves a stray file that the next attempt overwrites.
  pub async fn write(
    &self,
    kind: EntityKind,
    batch: u32,
    records: &[SourceRecord],
  ) -> Result<ShardEntry> {
    let mut manifest = self.require_manifest(kind).await?;
    if manifest.status != StageStatus::Extracting {
      return Err(Error::Corrupt(format!(
        "{kind} is already staged; discard it before writing new shards"
      )));
    }
    let expected = manifest.next_batch();
    if batch != expected {
      return Err(Error::OutOfOrder { kind, expected, found: batch });
    }

    let columns: Vec<&str> = manifest.columns.iter().map(String::as_str).collect();
    let (header, bytes) = shard::encode(kind, batch, &columns, records)?;

    let file = Self::shard_file(batch);
    write_atomic(&self.stage_dir(kind).join(&file), &bytes).await?;

    let entry = ShardEntry {
      batch,
      file,
      rows: header.rows,
      sha256: header.sha256,
    };
    manifest.shards.push(entry.clone());
    self.save_manifest(&manifest).await?;

    tracing::debug!(stage = %kind, batch, rows = entry.rows, "wrote shard");
    Ok(entry)
  }

  /// Mark extraction of `kind` complete.
  pub async fn finish_extraction(&self, kind: EntityKind) -> Result<StageManifest> {
    let mut manifest = self.require_manifest(kind).await?;
    if manifest.status == StageStatus::Extracting {
      manifest.status = StageStatus::Staged;
      manifest.extracted_at = Some(Utc::now());
      self.save_manifest(&manifest).await?;
    }
    Ok(manifest)
  }

  /// Record that the first `loaded_shards` shards have been committed.
  pub async fn mark_loading(&self, kind: EntityKind, loaded_shards: usize) -> Result<StageManifest> {
    let mut manifest = self.require_manifest(kind).await?;
    if !manifest.is_staged() {
      return Err(Error::NotStarted(kind));
    }
    manifest.status = StageStatus::Loading;
    manifest.loaded_shards = loaded_shards.min(manifest.shards.len());
    self.save_manifest(&manifest).await?;
    Ok(manifest)
  }

  pub async fn mark_loaded(&self, kind: EntityKind) -> Result<StageManifest> {
    let mut manifest = self.require_manifest(kind).await?;
    if !manifest.is_staged() {
      return Err(Error::NotStarted(kind));
    }
    manifest.status = StageStatus::Loaded;
    manifest.loaded_shards = manifest.shards.len();
    manifest.loaded_at = Some(Utc::now());
    self.save_manifest(&manifest).await?;
    Ok(manifest)
  }

  // ─── Validation ────────────────────────────────────────────────────────────

  /// The manifest of a complete extraction of `kind`, checked without
  /// reading any shard. Shards are verified later, as [`ShardReader`]
  /// returns them.
  pub async fn staged_manifest(&self, kind: EntityKind) -> Result<Option<StageManifest>> {
    let Some(manifest) = self.manifest(kind).await? else {
      return Ok(None);
    };
    if !manifest.is_staged() {
      return Ok(None);
    }
    if manifest.schema_version != crate::SCHEMA_VERSION {
      return Err(Error::SchemaVersion {
        kind,
        found: manifest.schema_version,
        expected: crate::SCHEMA_VERSION,
      });
    }
    Ok(Some(manifest))
  }

  /// Fully check the staged output of `kind`: the manifest, and every shard
  /// it lists against its recorded checksum.
  ///
  /// Returns `None` when nothing complete is staged (no manifest, or
  /// extraction still in progress).
  pub async fn validate(&self, kind: EntityKind) -> Result<Option<StageManifest>> {
    let Some(manifest) = self.staged_manifest(kind).await? else {
      return Ok(None);
    };
    let mut reader = self.reader(&manifest, 0);
    while reader.next_shard().await?.is_some() {}
    Ok(Some(manifest))
  }

  /// A complete, valid extraction of `kind` is staged.
  pub async fn exists(&self, kind: EntityKind) -> Result<bool> {
    Ok(self.validate(kind).await?.is_some())
  }

  // ─── Reading ───────────────────────────────────────────────────────────────

  pub async fn read(&self, kind: EntityKind) -> Result<ShardReader> { self.read_from(kind, 0).await }

  /// Read the staged shards of `kind`, skipping the first `skip` (already
  /// loaded) shards.
  pub async fn read_from(&self, kind: EntityKind, skip: usize) -> Result<ShardReader> {
    let manifest = self.require_manifest(kind).await?;
    if !manifest.is_staged() {
      return Err(Error::NotStarted(kind));
    }
    Ok(self.reader(&manifest, skip))
  }

  fn reader(&self, manifest: &StageManifest, skip: usize) -> ShardReader {
    ShardReader {
      dir:     self.stage_dir(manifest.kind),
      kind:    manifest.kind,
      columns: manifest.columns.clone(),
      shards:  manifest.shards.clone(),
      next:    skip.min(manifest.shards.len()),
    }
  }

  /// Delete everything staged for `kind`, forcing re-extraction.
  pub async fn discard(&self, kind: EntityKind) -> Result<bool> {
    let dir = self.stage_dir(kind);
    match fs::remove_dir_all(&dir).await {
      Ok(()) => {
        tracing::info!(stage = %kind, "discarded staged output");
        Ok(true)
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e.into()),
    }
  }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
  let tmp = path.with_extension("tmp");
  let mut file = fs::File::create(&tmp).await?;
  file.write_all(bytes).await?;
  file.sync_all().await?;
  drop(file);
  fs::rename(&tmp, path).await?;
  Ok(())
}

// ─── ShardReader ─────────────────────────────────────────────────────────────

/// Lazily reads and verifies the shards of one stage, in batch order.
#[derive(Debug)]
pub struct ShardReader {
  dir:     PathBuf,
  kind:    EntityKind,
  columns: Vec<String>,
  shards:  Vec<ShardEntry>,
  next:    usize,
}

impl ShardReader {
  /// The next shard, or `None` when all have been read.
  pub async fn next_shard(&mut self) -> Result<Option<Shard>> {
    let Some(entry) = self.shards.get(self.next) else {
      return Ok(None);
    };

    let path = self.dir.join(&entry.file);
    let bytes = match fs::read(&path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(Error::MissingShard {
          kind: self.kind,
          file: entry.file.clone(),
        });
      }
      Err(e) => return Err(e.into()),
    };

    let columns: Vec<&str> = self.columns.iter().map(String::as_str).collect();
    let shard = shard::decode(&bytes, self.kind, &columns)?;

    if shard.header.sha256 != entry.sha256 || shard.header.batch != entry.batch {
      return Err(Error::Checksum {
        kind:     self.kind,
        batch:    entry.batch,
        expected: entry.sha256.clone(),
        actual:   shard.header.sha256,
      });
    }

    self.next += 1;
    Ok(Some(shard))
  }

  /// Index (0-based) of the next shard to be read.
  pub fn position(&self) -> usize { self.next }

  pub fn remaining(&self) -> usize { self.shards.len() - self.next }
}
