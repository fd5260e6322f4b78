//! Cooperative cancellation.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

/// A shared flag the pipeline polls between shards and commit groups.
///
/// Clones observe the same flag. Tripping it never interrupts a commit in
/// flight; the pipeline stops at the next check.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
  pub fn new() -> Self { Self::default() }

  pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}
