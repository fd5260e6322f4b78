//! Tenancy: `DefaultTenant` clients and the `Community` nodes under them.
//!
//! Both kinds share one row shape; a community additionally references the
//! client that owns it.

use crate::{
  MappingError,
  entity::EntityKind,
  mapper::{clean, compact, epoch_to_timestamp, status},
  migration::Migration,
  record::SourceRecord,
  row::TargetRow,
};

/// The tenant columns shared by clients and communities, keyed by `key`.
fn tenant_row(
  kind: EntityKind,
  key_field: &'static str,
  name_field: &'static str,
  record: &SourceRecord,
) -> Result<TargetRow, MappingError> {
  let key = record.require_key(kind, key_field)?;
  let domain = record.require_key(kind, "domain")?;

  Ok(
    TargetRow::new(kind, key.as_str())
      .column("name", clean(record.get(name_field)))
      .column("location", clean(record.get("location")))
      .column("location_name", clean(record.get("location_name")))
      .column("status", status(record.get("status")))
      .column("ticket_prefix", key.to_uppercase())
      .column("ticket_start_index", 0_i64)
      .column("type", compact(record.get("type_name")))
      .column("domain", domain)
      .column("created_by", clean(record.get("created_by")))
      .column("created_on", epoch_to_timestamp(record.get("created_on")))
      .column("reference_number", clean(record.get("identifier"))),
  )
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct ClientMigration;

impl Migration for ClientMigration {
  fn kind(&self) -> EntityKind { EntityKind::Client }

  fn columns(&self) -> &'static [&'static str] {
    &[
      "client_id",
      "client_name",
      "location",
      "location_name",
      "status",
      "domain",
      "type_name",
      "created_by",
      "created_on",
      "identifier",
    ]
  }

  fn required(&self) -> &'static [&'static str] { &["client_id"] }

  fn cypher(&self) -> &'static str {
    "MATCH (n:DefaultTenant)
     WHERE n.domain = $domain
     RETURN id(n)                      AS source_id,
            n.clientId                 AS client_id,
            n.clientName               AS client_name,
            n.location                 AS location,
            n.locationName             AS location_name,
            coalesce(n.status, 'ACTIVE') AS status,
            n.domain                   AS domain,
            n.typeName                 AS type_name,
            n.createdBy                AS created_by,
            n.createdOn                AS created_on,
            n.identifier               AS identifier
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    Ok(vec![tenant_row(self.kind(), "client_id", "client_name", record)?])
  }
}

// ─── Community ───────────────────────────────────────────────────────────────

pub struct CommunityMigration;

impl Migration for CommunityMigration {
  fn kind(&self) -> EntityKind { EntityKind::Community }

  fn columns(&self) -> &'static [&'static str] {
    &[
      "community_id",
      "community_name",
      "location",
      "location_name",
      "status",
      "domain",
      "type_name",
      "created_by",
      "created_on",
      "identifier",
      "client_id",
    ]
  }

  fn required(&self) -> &'static [&'static str] { &["community_id"] }

  fn cypher(&self) -> &'static str {
    "MATCH (n:Community)
     WHERE n.domain = $domain
     OPTIONAL MATCH (tenant:DefaultTenant)-[:tenant]->(n)
     WITH n, head(collect(tenant.clientId)) AS client_id
     RETURN id(n)                      AS source_id,
            n.clientId                 AS community_id,
            n.clientName               AS community_name,
            n.location                 AS location,
            n.locationName             AS location_name,
            coalesce(n.status, 'ACTIVE') AS status,
            n.domain                   AS domain,
            n.typeName                 AS type_name,
            n.createdBy                AS created_by,
            n.createdOn                AS created_on,
            n.identifier               AS identifier,
            client_id
     ORDER BY source_id
     SKIP $skip LIMIT $limit"
  }

  fn map(&self, record: &SourceRecord) -> Result<Vec<TargetRow>, MappingError> {
    let kind = self.kind();
    let client = record.require_key(kind, "client_id")?;
    let row = tenant_row(kind, "community_id", "community_name", record)?
      .reference("client_ref", EntityKind::Client, client);
    Ok(vec![row])
  }
}
