//! Equipment: assets equipped in buildings, the spaces that tag them, and the
//! points they share.

use crate::{
  MappingError,
  entity::EntityKind,
  mapper::{clean, epoch_to_timestamp, link_key, parse_f64, parse_i64, split_list, status},
  migration::Migration,
  record::SourceRecord,
  row::TargetRow,
};

// ─── Asset ───────────────────────────────────────────────────────────────────

pub struct AssetMigration;

impl Migration for AssetMigration {
  fn kind(&self) -> EntityKind { EntityKind::Asset }

  fn columns(&self) -> &'static [&'static str] {
    &[
      "asset_id",
      "asset_name",
      "asset_code",
      "location",
      "cost_of_purchase",
      "created_by",
      "created_on",
      "asset_status",
      "asset_domain",
      "asset_type",
      "community_id",
      "building_id",
      "sub_community_id",
    ]
  }

  fn required(&self) -> &'static [&'static str] { &["asset_id"] }

  fn cypher(&self) -> &'static str {
    "MATCH (sc:SubCommunity)-[:tags]->(b)-[:equips]->(a)
     WHERE a.domain = $domain AND coalesce(a.status, '') <> 'DELETED'
     WITH a, head(collect(b)) AS b, head(collect(sc)) AS sc
     RETURN id(a)            AS source_id,
            a.identifier     AS asset_id,
            a.displayName    AS asset_name,
            a.assetCode      AS asset_code,
            a.location       AS location,
            a.costOfPurchase AS cost_of_purchase,
            a.createdBy      AS created_by,
            a.createdOn      AS created_on,
            a.status         AS asset_status,
            a.domain         AS asset_domain,
            labels(a)[0]     AS asset_type,
            b.ownerClientId  AS community_id,
            b.identifier     AS building_id,
            sc.identifier    AS sub_community_id
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let id = record.require_key(kind, "asset_id")?;
    let building = record.require_key(kind, "building_id")?;

    Ok(vec![
      TargetRow::new(kind, id)
        .column("display_name", clean(record.get("asset_name")))
        .column("asset_code", clean(record.get("asset_code")))
        .column("location", clean(record.get("location")))
        .column("cost_of_purchase", parse_f64(record.get("cost_of_purchase")))
        .column("status", status(record.get("asset_status")))
        .column("domain", clean(record.get("asset_domain")))
        .column("client_code", clean(record.get("community_id")))
        .column("sub_community_code", clean(record.get("sub_community_id")))
        .column("created_by", clean(record.get("created_by")))
        .column("created_on", epoch_to_timestamp(record.get("created_on")))
        .soft_reference("asset_type_ref", EntityKind::AssetType, clean(record.get("asset_type")))
        .reference("building_ref", EntityKind::Building, building),
    ])
  }
}

// ─── AssetSpaceLink ──────────────────────────────────────────────────────────

/// One record per asset listing every space that tags it.
pub struct AssetSpaceLinkMigration;

impl Migration for AssetSpaceLinkMigration {
  fn kind(&self) -> EntityKind { EntityKind::AssetSpaceLink }

  fn columns(&self) -> &'static [&'static str] { &["asset_id", "space_ids"] }

  fn required(&self) -> &'static [&'static str] { &["asset_id"] }

  fn cypher(&self) -> &'static str {
    "MATCH (:SubCommunity)-[:tags]->()-[:equips]->(a)<-[:tags]-(s)
     WHERE a.domain = $domain
       AND coalesce(a.status, '') <> 'DELETED'
       AND coalesce(s.status, '') <> 'DELETED'
       AND NOT s:SubCommunity
     WITH a, collect(DISTINCT s.identifier) AS space_ids
     RETURN id(a)        AS source_id,
            a.identifier AS asset_id,
            space_ids
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let asset = record.require_key(kind, "asset_id")?;
    let spaces = split_list(record.get("space_ids"));
    if spaces.is_empty() {
      return Err(MappingError::MissingField { kind, field: "space_ids" });
    }

    Ok(
      spaces
        .iter()
        .map(|space| {
          TargetRow::new(kind, link_key(&asset, space))
            .reference("asset_ref", EntityKind::Asset, asset.as_str())
            .reference("space_ref", EntityKind::Space, space.as_str())
        })
        .collect(),
    )
  }
}

// ─── Point ───────────────────────────────────────────────────────────────────

pub struct PointMigration;

impl Migration for PointMigration {
  fn kind(&self) -> EntityKind { EntityKind::Point }

  fn columns(&self) -> &'static [&'static str] {
    &[
      "data_point_id",
      "point_name",
      "point_display_name",
      "point_data_type",
      "remote_data_type",
      "access_type",
      "point_status",
      "point_symbol",
      "point_unit",
      "point_expression",
      "point_precedence",
      "point_type",
      "asset_id",
    ]
  }

  fn required(&self) -> &'static [&'static str] { &["data_point_id"] }

  fn cypher(&self) -> &'static str {
    "MATCH (:SubCommunity)-[:tags]->()-[:equips]->(a)-[:sharePoint]->(p:Point)
     WHERE p.domain = $domain
       AND coalesce(p.status, '') <> 'DELETED'
       AND coalesce(a.status, '') <> 'DELETED'
     WITH p, head(collect(DISTINCT a.identifier)) AS asset_id
     RETURN id(p)            AS source_id,
            p.identifier     AS data_point_id,
            p.pointName      AS point_name,
            p.displayName    AS point_display_name,
            p.dataType       AS point_data_type,
            p.remoteDataType AS remote_data_type,
            p.accessType     AS access_type,
            p.status         AS point_status,
            p.unitSymbol     AS point_symbol,
            p.unit           AS point_unit,
            p.expression     AS point_expression,
            p.precedence     AS point_precedence,
            p.type           AS point_type,
            asset_id
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let id = record.require_key(kind, "data_point_id")?;
    let asset = record.require_key(kind, "asset_id")?;

    Ok(vec![
      TargetRow::new(kind, id)
        .column("point_name", clean(record.get("point_name")))
        .column("display_name", clean(record.get("point_display_name")))
        .column("data_type", clean(record.get("point_data_type")))
        .column("remote_data_type", clean(record.get("remote_data_type")))
        .column("access_type", clean(record.get("access_type")))
        .column("status", status(record.get("point_status")))
        .column("unit_symbol", clean(record.get("point_symbol")))
        .column("unit", clean(record.get("point_unit")))
        .column("expression", clean(record.get("point_expression")))
        .column("precedence", parse_i64(record.get("point_precedence")))
        .column("point_type", clean(record.get("point_type")))
        .reference("asset_ref", EntityKind::Asset, asset),
    ])
  }
}

// ─── AssetPointLink ──────────────────────────────────────────────────────────

/// Points may be shared by several assets; one record per (asset, point).
pub struct AssetPointLinkMigration;

impl Migration for AssetPointLinkMigration {
  fn kind(&self) -> EntityKind { EntityKind::AssetPointLink }

  fn columns(&self) -> &'static [&'static str] { &["asset_id", "data_point_id"] }

  fn required(&self) -> &'static [&'static str] { &["asset_id", "data_point_id"] }

  fn cypher(&self) -> &'static str {
    "MATCH (:SubCommunity)-[:tags]->()-[:equips]->(a)-[:sharePoint]->(p:Point)
     WHERE p.domain = $domain
       AND coalesce(p.status, '') <> 'DELETED'
       AND coalesce(a.status, '') <> 'DELETED'
     WITH DISTINCT a, p
     RETURN id(p)        AS source_id,
            a.identifier AS asset_id,
            p.identifier AS data_point_id
     ORDER BY source_id, asset_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let asset = record.require_key(kind, "asset_id")?;
    let point = record.require_key(kind, "data_point_id")?;

    Ok(vec![
      TargetRow::new(kind, link_key(&asset, &point))
        .reference("asset_ref", EntityKind::Asset, asset)
        .reference("point_ref", EntityKind::Point, point),
    ])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{migrations::fixtures::record, row::Value};

  #[test]
  fn asset_type_reference_is_optional() {
    let rows = AssetMigration
      .map(&record(&[("asset_id", "A-1"), ("building_id", "B-1")]))
      .unwrap();
    let refs = &rows[0].references;
    assert_eq!(refs[0].kind, EntityKind::AssetType);
    assert_eq!(refs[0].natural_key, None);
    assert_eq!(refs[1].natural_key.as_deref(), Some("B-1"));
  }

  #[test]
  fn asset_cost_parses_as_real() {
    let rows = AssetMigration
      .map(&record(&[
        ("asset_id", "A-1"),
        ("building_id", "B-1"),
        ("cost_of_purchase", "1250.75"),
      ]))
      .unwrap();
    assert_eq!(rows[0].value("cost_of_purchase"), Some(&Value::Real(1250.75)));
  }

  #[test]
  fn asset_space_link_emits_one_row_per_space() {
    let rows = AssetSpaceLinkMigration
      .map(&record(&[("asset_id", "A-1"), ("space_ids", "S-1;S-2")]))
      .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].natural_key, "A-1|S-1");
    assert_eq!(rows[1].references[1].natural_key.as_deref(), Some("S-2"));
  }

  #[test]
  fn asset_space_link_without_spaces_is_rejected() {
    let err = AssetSpaceLinkMigration
      .map(&record(&[("asset_id", "A-1")]))
      .unwrap_err();
    assert!(matches!(err, MappingError::MissingField { field: "space_ids", .. }));
  }

  #[test]
  fn point_requires_asset() {
    let err = PointMigration
      .map(&record(&[("data_point_id", "P-1")]))
      .unwrap_err();
    assert_eq!(err, MappingError::MissingField {
      kind:  EntityKind::Point,
      field: "asset_id",
    });
  }
}
