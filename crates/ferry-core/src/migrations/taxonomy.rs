//! Template taxonomy: `Template` nodes linked by `extends`.

use crate::{
  MappingError,
  entity::EntityKind,
  mapper::{clean, link_key, split_list, status},
  migration::Migration,
  record::SourceRecord,
  row::TargetRow,
};

// ─── Type ────────────────────────────────────────────────────────────────────

pub struct TypeMigration;

impl Migration for TypeMigration {
  fn kind(&self) -> EntityKind { EntityKind::Type }

  fn columns(&self) -> &'static [&'static str] {
    &["parent_name", "child_name", "child_display_name", "child_template_name"]
  }

  fn required(&self) -> &'static [&'static str] { &["child_name"] }

  fn cypher(&self) -> &'static str {
    "MATCH (parent:Template)-[:extends]->(child:Template)
     WHERE child.domain = $domain
     WITH child, head(collect(parent.name)) AS parent_name
     RETURN id(child)          AS source_id,
            parent_name,
            child.name         AS child_name,
            child.displayName  AS child_display_name,
            child.templateName AS child_template_name
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let name = record.require_key(kind, "child_name")?;

    Ok(vec![
      TargetRow::new(kind, name.clone())
        .column("name", name)
        .column("parent_name", clean(record.get("parent_name")))
        .column("display_name", clean(record.get("child_display_name")))
        .column("template_name", clean(record.get("child_template_name")))
        .column("status", status(None)),
    ])
  }
}

// ─── AssetType ───────────────────────────────────────────────────────────────

/// Templates that (transitively) extend the `Asset` template.
///
/// Keyed by template name, which is how assets name their type.
pub struct AssetTypeMigration;

impl Migration for AssetTypeMigration {
  fn kind(&self) -> EntityKind { EntityKind::AssetType }

  fn columns(&self) -> &'static [&'static str] {
    &["parent_name", "child_name", "child_template_name", "type_code"]
  }

  fn required(&self) -> &'static [&'static str] { &["child_name", "child_template_name"] }

  fn cypher(&self) -> &'static str {
    "MATCH (:Template {name: 'Asset'})-[:extends*0..]->(parent:Template)-[:extends]->(child:Template)
     WHERE child.domain = $domain
     WITH child, head(collect(DISTINCT parent.name)) AS parent_name
     RETURN id(child)          AS source_id,
            parent_name,
            child.name         AS child_name,
            child.templateName AS child_template_name,
            child.typeCode     AS type_code
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let template = record.require_key(kind, "child_template_name")?;
    let name = record.require_key(kind, "child_name")?;

    Ok(vec![
      TargetRow::new(kind, template)
        .column("name", name.as_str())
        .column("parent_name", clean(record.get("parent_name")))
        .column("type_code", clean(record.get("type_code")))
        .column("status", status(None))
        .reference("type_ref", EntityKind::Type, name),
    ])
  }
}

// ─── AssetTypePointLink ──────────────────────────────────────────────────────

/// Which point templates an asset type carries; one record per asset type,
/// one link row per point template.
pub struct AssetTypePointLinkMigration;

impl Migration for AssetTypePointLinkMigration {
  fn kind(&self) -> EntityKind { EntityKind::AssetTypePointLink }

  fn columns(&self) -> &'static [&'static str] {
    &["asset_template_name", "point_template_names"]
  }

  fn required(&self) -> &'static [&'static str] { &["asset_template_name"] }

  fn cypher(&self) -> &'static str {
    "MATCH (at:Template)-[:sharePoint]->(pt:Template)
     WHERE at.domain = $domain
     WITH at, collect(DISTINCT pt.name) AS point_template_names
     RETURN id(at)          AS source_id,
            at.templateName AS asset_template_name,
            point_template_names
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let asset_type = record.require_key(kind, "asset_template_name")?;
    let points = split_list(record.get("point_template_names"));
    if points.is_empty() {
      return Err(MappingError::MissingField { kind, field: "point_template_names" });
    }

    Ok(
      points
        .iter()
        .map(|point| {
          TargetRow::new(kind, link_key(&asset_type, point))
            .reference("asset_type_ref", EntityKind::AssetType, asset_type.as_str())
            .reference("point_template_ref", EntityKind::Type, point.as_str())
        })
        .collect(),
    )
  }
}
