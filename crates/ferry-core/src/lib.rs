//! Core types and trait definitions for the ferry migration pipeline.
//!
//! This crate is deliberately free of HTTP, filesystem, and database
//! dependencies. It defines the entity kinds and their fixed stage order, the
//! record and row shapes that flow between pipeline components, the
//! [`Migration`](migration::Migration) capability implemented once per entity
//! kind, and the traits the source and target backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod entity;
pub mod error;
pub mod mapper;
pub mod migration;
pub mod migrations;
pub mod record;
pub mod row;
pub mod source;
pub mod store;

pub use entity::EntityKind;
pub use error::{Error, MappingError, Result};
