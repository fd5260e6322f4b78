//! Durable staging for extracted records.
//!
//! Each entity kind gets its own directory of numbered CSV shards plus a
//! `manifest.json` recording extraction and load progress. The staging
//! directory doubles as the extraction cache and as the resume checkpoint:
//! a stage whose shards validate is never extracted again.
//!
//! ```text
//! <staging_dir>/.lock
//! <staging_dir>/<stage>/manifest.json
//! <staging_dir>/<stage>/data_1.csv
//! <staging_dir>/<stage>/data_2.csv
//! ```

pub mod error;
mod lock;
pub mod manifest;
pub mod shard;
mod store;

pub use error::{Error, Result};
pub use lock::StagingLock;
pub use manifest::{ShardEntry, StageManifest, StageStatus};
pub use shard::{SCHEMA_VERSION, Shard, ShardHeader};
pub use store::{ShardReader, StagingStore};
