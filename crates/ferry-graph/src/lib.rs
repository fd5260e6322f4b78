//! Graph sources for the migration pipeline.
//!
//! [`Neo4jHttpSource`] talks to a Neo4j server over its transactional HTTP
//! endpoint. [`MemoryGraph`] holds nodes in process and is used by tests and
//! dry runs.

pub mod error;
mod memory;
mod neo4j;

pub use error::GraphError;
pub use memory::MemoryGraph;
pub use neo4j::{Neo4jConfig, Neo4jHttpSource};
