//! The `Migration` capability and the registry of all migrations.
//!
//! A migration describes one stage: which columns it stages, which of them
//! the source must always provide, the Cypher query that extracts them, and
//! how a staged record maps to target rows. Extraction, staging and loading
//! are generic over this trait, so adding an entity kind means adding an
//! implementation here rather than a branch in the orchestrator.

use crate::{
  MappingError,
  entity::EntityKind,
  migrations,
  record::SourceRecord,
  row::TargetRow,
};

/// A parametrised, read-only source query.
///
/// Every query takes `$domain`, `$skip` and `$limit`, orders by the
/// source-assigned node id so pages are stable, and returns the migration's
/// canonical columns (extra columns such as `source_id` are dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceQuery {
  pub kind:    EntityKind,
  pub cypher:  &'static str,
  pub columns: &'static [&'static str],
}

pub trait Migration: Send + Sync {
  fn kind(&self) -> EntityKind;

  /// The stage name, e.g. `asset-type`.
  fn stage_name(&self) -> &'static str { self.kind().stage_name() }

  /// Canonical staged columns, in header order.
  fn columns(&self) -> &'static [&'static str];

  /// Columns every extracted record must carry; a record without them is
  /// malformed and fails extraction.
  fn required(&self) -> &'static [&'static str];

  /// The Cypher text used to extract this kind.
  fn cypher(&self) -> &'static str;

  fn source_query(&self) -> SourceQuery {
    SourceQuery {
      kind:    self.kind(),
      cypher:  self.cypher(),
      columns: self.columns(),
    }
  }

  /// Map one staged record to its target rows.
  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError>;
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// All migrations, in stage order.
pub struct Registry {
  migrations: Vec<Box<dyn Migration>>,
}

impl Registry {
  /// The twelve built-in migrations.
  pub fn standard() -> Self {
    Self {
      migrations: vec![
        Box::new(migrations::taxonomy::TypeMigration),
        Box::new(migrations::tenancy::ClientMigration),
        Box::new(migrations::tenancy::CommunityMigration),
        Box::new(migrations::taxonomy::AssetTypeMigration),
        Box::new(migrations::site::SubcommunityMigration),
        Box::new(migrations::site::BuildingMigration),
        Box::new(migrations::site::SpaceMigration),
        Box::new(migrations::equipment::AssetMigration),
        Box::new(migrations::equipment::AssetSpaceLinkMigration),
        Box::new(migrations::equipment::PointMigration),
        Box::new(migrations::equipment::AssetPointLinkMigration),
        Box::new(migrations::taxonomy::AssetTypePointLinkMigration),
      ],
    }
  }

  /// The migration for `kind`.
  ///
  /// The standard registry covers every kind; the lookup cannot miss.
  pub fn get(&self, kind: EntityKind) -> &dyn Migration {
    self.migrations[kind.position()].as_ref()
  }

  pub fn iter(&self) -> impl Iterator<Item = &dyn Migration> {
    self.migrations.iter().map(AsRef::as_ref)
  }
}

impl Default for Registry {
  fn default() -> Self { Self::standard() }
}
