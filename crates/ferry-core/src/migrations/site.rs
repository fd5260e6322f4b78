//! Physical sites: `SubCommunity` → building → space.
//!
//! Buildings and spaces carry no fixed label in the graph; they are found by
//! their position (`tags`, `equips`) and their first label is kept as `type`.

use crate::{
  MappingError,
  entity::EntityKind,
  mapper::{clean, epoch_to_timestamp, parse_i64, status},
  migration::Migration,
  record::SourceRecord,
  row::TargetRow,
};

// ─── Subcommunity ────────────────────────────────────────────────────────────

pub struct SubcommunityMigration;

impl Migration for SubcommunityMigration {
  fn kind(&self) -> EntityKind { EntityKind::Subcommunity }

  fn columns(&self) -> &'static [&'static str] {
    &[
      "sub_community_id",
      "sub_community_name",
      "sub_community_location",
      "sub_community_status",
      "sub_community_domain",
      "sub_community_type",
      "sub_community_created_by",
      "sub_community_created_on",
      "community_id",
    ]
  }

  fn required(&self) -> &'static [&'static str] { &["sub_community_id"] }

  fn cypher(&self) -> &'static str {
    "MATCH (sc:SubCommunity)
     WHERE sc.domain = $domain AND coalesce(sc.status, '') <> 'DELETED'
     OPTIONAL MATCH (sc)-[:tags]->(b)
     WITH sc, head(collect(b.ownerClientId)) AS community_id
     RETURN id(sc)           AS source_id,
            sc.identifier    AS sub_community_id,
            sc.name          AS sub_community_name,
            sc.location      AS sub_community_location,
            sc.status        AS sub_community_status,
            sc.domain        AS sub_community_domain,
            labels(sc)[0]    AS sub_community_type,
            sc.createdBy     AS sub_community_created_by,
            sc.createdOn     AS sub_community_created_on,
            community_id
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let id = record.require_key(kind, "sub_community_id")?;
    let community = record.require_key(kind, "community_id")?;

    Ok(vec![
      TargetRow::new(kind, id)
        .column("name", clean(record.get("sub_community_name")))
        .column("geo_location", clean(record.get("sub_community_location")))
        .column("status", status(record.get("sub_community_status")))
        .column("domain", clean(record.get("sub_community_domain")))
        .column("type", clean(record.get("sub_community_type")))
        .column("created_by", clean(record.get("sub_community_created_by")))
        .column("created_on", epoch_to_timestamp(record.get("sub_community_created_on")))
        .reference("community_ref", EntityKind::Community, community),
    ])
  }
}

// ─── Building ────────────────────────────────────────────────────────────────

pub struct BuildingMigration;

impl Migration for BuildingMigration {
  fn kind(&self) -> EntityKind { EntityKind::Building }

  fn columns(&self) -> &'static [&'static str] {
    &[
      "building_id",
      "building_name",
      "building_status",
      "building_location",
      "building_site_code",
      "building_open_time",
      "building_close_time",
      "building_domain",
      "building_type",
      "building_created_by",
      "building_created_on",
      "sub_community_id",
    ]
  }

  fn required(&self) -> &'static [&'static str] { &["building_id"] }

  fn cypher(&self) -> &'static str {
    "MATCH (sc:SubCommunity)-[:tags]->(b)
     WHERE b.domain = $domain
       AND coalesce(b.status, '') <> 'DELETED'
       AND EXISTS { (b)-[:equips]->() }
     WITH b, head(collect(sc.identifier)) AS sub_community_id
     RETURN id(b)            AS source_id,
            b.identifier     AS building_id,
            b.name           AS building_name,
            b.status         AS building_status,
            b.location       AS building_location,
            b.siteCode       AS building_site_code,
            b.storeOpenTime  AS building_open_time,
            b.storeCloseTime AS building_close_time,
            b.domain         AS building_domain,
            labels(b)[0]     AS building_type,
            b.createdBy      AS building_created_by,
            b.createdOn      AS building_created_on,
            sub_community_id
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let id = record.require_key(kind, "building_id")?;
    let subcommunity = record.require_key(kind, "sub_community_id")?;

    Ok(vec![
      TargetRow::new(kind, id)
        .column("name", clean(record.get("building_name")))
        .column("status", status(record.get("building_status")))
        .column("geo_location", clean(record.get("building_location")))
        .column("site_code", clean(record.get("building_site_code")))
        .column("store_open_time", epoch_to_timestamp(record.get("building_open_time")))
        .column("store_close_time", epoch_to_timestamp(record.get("building_close_time")))
        .column("domain", clean(record.get("building_domain")))
        .column("type", clean(record.get("building_type")))
        .column("created_by", clean(record.get("building_created_by")))
        .column("created_on", epoch_to_timestamp(record.get("building_created_on")))
        .reference("subcommunity_ref", EntityKind::Subcommunity, subcommunity),
    ])
  }
}

// ─── Space ───────────────────────────────────────────────────────────────────

pub struct SpaceMigration;

impl Migration for SpaceMigration {
  fn kind(&self) -> EntityKind { EntityKind::Space }

  fn columns(&self) -> &'static [&'static str] {
    &[
      "spaces_id",
      "spaces_name",
      "spaces_layout",
      "spaces_status",
      "spaces_domain",
      "spaces_type",
      "building_id",
    ]
  }

  fn required(&self) -> &'static [&'static str] { &["spaces_id"] }

  fn cypher(&self) -> &'static str {
    "MATCH (:SubCommunity)-[:tags]->(b)-[:equips]->()<-[:tags]-(s)
     WHERE s.domain = $domain
       AND coalesce(s.status, '') <> 'DELETED'
       AND NOT s:SubCommunity
     WITH s, head(collect(DISTINCT b.identifier)) AS building_id
     RETURN id(s)             AS source_id,
            s.identifier      AS spaces_id,
            s.name            AS spaces_name,
            s.layoutHierarchy AS spaces_layout,
            s.status          AS spaces_status,
            s.domain          AS spaces_domain,
            labels(s)[0]      AS spaces_type,
            building_id
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let id = record.require_key(kind, "spaces_id")?;
    let building = record.require_key(kind, "building_id")?;

    Ok(vec![
      TargetRow::new(kind, id)
        .column("name", clean(record.get("spaces_name")))
        .column("layout_hierarchy", parse_i64(record.get("spaces_layout")).unwrap_or(0))
        .column("status", status(record.get("spaces_status")))
        .column("domain", clean(record.get("spaces_domain")))
        .column("type", clean(record.get("spaces_type")))
        .reference("building_ref", EntityKind::Building, building),
    ])
  }
}
