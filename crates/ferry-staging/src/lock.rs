//! Single-writer lock over a staging directory.

use std::{
  fs::OpenOptions,
  io::{ErrorKind, Write},
  path::{Path, PathBuf},
};

use crate::{Error, Result};

/// Held for the lifetime of a run. The lock file is created exclusively and
/// removed on drop; a crashed run leaves it behind and must be cleared by hand.
#[derive(Debug)]
pub struct StagingLock {
  path: PathBuf,
}

impl StagingLock {
  pub const FILE: &'static str = ".lock";

  pub fn acquire(root: &Path) -> Result<Self> {
    std::fs::create_dir_all(root)?;
    let path = root.join(Self::FILE);

    match OpenOptions::new().write(true).create_new(true).open(&path) {
      Ok(mut file) => {
        writeln!(
          file,
          "pid={} at={}",
          std::process::id(),
          chrono::Utc::now().to_rfc3339()
        )?;
        file.sync_all()?;
        tracing::debug!(path = %path.display(), "acquired staging lock");
        Ok(Self { path })
      }
      Err(e) if e.kind() == ErrorKind::AlreadyExists => {
        let holder = std::fs::read_to_string(&path)
          .map(|s| s.trim().to_owned())
          .unwrap_or_else(|_| "unknown holder".to_owned());
        Err(Error::Locked { path, holder })
      }
      Err(e) => Err(e.into()),
    }
  }

  pub fn path(&self) -> &Path { &self.path }
}

impl Drop for StagingLock {
  fn drop(&mut self) {
    if let Err(e) = std::fs::remove_file(&self.path) {
      tracing::warn!(path = %self.path.display(), "failed to release staging lock: {e}");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn second_acquire_fails_until_first_is_dropped() {
    let dir = tempfile::tempdir().unwrap();

    let first = StagingLock::acquire(dir.path()).unwrap();
    assert!(first.path().exists());

    let err = StagingLock::acquire(dir.path()).unwrap_err();
    match err {
      Error::Locked { holder, .. } => assert!(holder.starts_with("pid=")),
      other => panic!("expected Locked, got {other:?}"),
    }

    drop(first);
    assert!(!dir.path().join(StagingLock::FILE).exists());
    StagingLock::acquire(dir.path()).unwrap();
  }
}
