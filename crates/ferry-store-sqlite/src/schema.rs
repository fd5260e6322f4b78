//! SQL schema for the relational target.
//!
//! Every table carries a surrogate `id` assigned on first insert and a unique
//! `natural_key`, the idempotence key for upserts. Reference columns end in
//! `_ref` and point at the surrogate `id` of the referenced table.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS types (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key   TEXT NOT NULL UNIQUE,   -- child template name
    name          TEXT NOT NULL,
    parent_name   TEXT,
    display_name  TEXT,
    template_name TEXT,
    status        TEXT NOT NULL DEFAULT 'ACTIVE'
);

CREATE TABLE IF NOT EXISTS clients (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key        TEXT NOT NULL UNIQUE,   -- client id
    name               TEXT,
    location           TEXT,
    location_name      TEXT,
    status             TEXT NOT NULL DEFAULT 'ACTIVE',
    ticket_prefix      TEXT NOT NULL,
    ticket_start_index INTEGER NOT NULL DEFAULT 0,
    type               TEXT,
    domain             TEXT NOT NULL,
    created_by         TEXT,
    created_on         TEXT,                   -- RFC 3339 UTC
    reference_number   TEXT
);

CREATE TABLE IF NOT EXISTS communities (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key        TEXT NOT NULL UNIQUE,   -- community id
    name               TEXT,
    location           TEXT,
    location_name      TEXT,
    status             TEXT NOT NULL DEFAULT 'ACTIVE',
    ticket_prefix      TEXT NOT NULL,
    ticket_start_index INTEGER NOT NULL DEFAULT 0,
    type               TEXT,
    domain             TEXT NOT NULL,
    created_by         TEXT,
    created_on         TEXT,
    reference_number   TEXT,
    client_ref         INTEGER NOT NULL REFERENCES clients(id)
);

CREATE TABLE IF NOT EXISTS asset_type (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key TEXT NOT NULL UNIQUE,   -- child template name
    name        TEXT NOT NULL,
    parent_name TEXT,
    type_code   TEXT,
    status      TEXT NOT NULL DEFAULT 'ACTIVE',
    type_ref    INTEGER NOT NULL REFERENCES types(id)
);

CREATE TABLE IF NOT EXISTS subcommunities (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key   TEXT NOT NULL UNIQUE,
    name          TEXT,
    geo_location  TEXT,
    status        TEXT NOT NULL DEFAULT 'ACTIVE',
    domain        TEXT,
    type          TEXT,
    created_by    TEXT,
    created_on    TEXT,
    community_ref INTEGER NOT NULL REFERENCES communities(id)
);

CREATE TABLE IF NOT EXISTS buildings (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key      TEXT NOT NULL UNIQUE,
    name             TEXT,
    status           TEXT NOT NULL DEFAULT 'ACTIVE',
    geo_location     TEXT,
    site_code        TEXT,
    store_open_time  TEXT,
    store_close_time TEXT,
    domain           TEXT,
    type             TEXT,
    created_by       TEXT,
    created_on       TEXT,
    subcommunity_ref INTEGER NOT NULL REFERENCES subcommunities(id)
);

CREATE TABLE IF NOT EXISTS spaces (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key      TEXT NOT NULL UNIQUE,
    name             TEXT,
    layout_hierarchy INTEGER NOT NULL DEFAULT 0,
    status           TEXT NOT NULL DEFAULT 'ACTIVE',
    domain           TEXT,
    type             TEXT,
    building_ref     INTEGER NOT NULL REFERENCES buildings(id)
);

CREATE TABLE IF NOT EXISTS assets (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key        TEXT NOT NULL UNIQUE,
    display_name       TEXT,
    asset_code         TEXT,
    location           TEXT,
    cost_of_purchase   REAL,
    status             TEXT NOT NULL DEFAULT 'ACTIVE',
    domain             TEXT,
    client_code        TEXT,
    sub_community_code TEXT,
    created_by         TEXT,
    created_on         TEXT,
    asset_type_ref     INTEGER REFERENCES asset_type(id),
    building_ref       INTEGER NOT NULL REFERENCES buildings(id)
);

-- Link tables are keyed by 'left|right' natural keys.
CREATE TABLE IF NOT EXISTS asset_spaces (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key TEXT NOT NULL UNIQUE,
    asset_ref   INTEGER NOT NULL REFERENCES assets(id),
    space_ref   INTEGER NOT NULL REFERENCES spaces(id)
);

CREATE TABLE IF NOT EXISTS points (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key      TEXT NOT NULL UNIQUE,
    point_name       TEXT,
    display_name     TEXT,
    data_type        TEXT,
    remote_data_type TEXT,
    access_type      TEXT,
    status           TEXT NOT NULL DEFAULT 'ACTIVE',
    unit_symbol      TEXT,
    unit             TEXT,
    expression       TEXT,
    precedence       INTEGER,
    point_type       TEXT,
    asset_ref        INTEGER NOT NULL REFERENCES assets(id)
);

CREATE TABLE IF NOT EXISTS asset_points (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key TEXT NOT NULL UNIQUE,
    asset_ref   INTEGER NOT NULL REFERENCES assets(id),
    point_ref   INTEGER NOT NULL REFERENCES points(id)
);

CREATE TABLE IF NOT EXISTS asset_type_points (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key        TEXT NOT NULL UNIQUE,
    asset_type_ref     INTEGER NOT NULL REFERENCES asset_type(id),
    point_template_ref INTEGER NOT NULL REFERENCES types(id)
);

CREATE INDEX IF NOT EXISTS communities_client_idx  ON communities(client_ref);
CREATE INDEX IF NOT EXISTS buildings_subcomm_idx   ON buildings(subcommunity_ref);
CREATE INDEX IF NOT EXISTS spaces_building_idx     ON spaces(building_ref);
CREATE INDEX IF NOT EXISTS assets_building_idx     ON assets(building_ref);
CREATE INDEX IF NOT EXISTS points_asset_idx        ON points(asset_ref);

PRAGMA user_version = 1;
";
