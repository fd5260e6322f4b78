//! The built-in migrations, grouped by the part of the graph they read.
//!
//! - [`taxonomy`]: the template hierarchy of types and asset types, and which point
//!   templates an asset type carries.
//! - [`tenancy`]: clients and the communities under them.
//! - [`site`]: subcommunities, buildings, spaces.
//! - [`equipment`]: assets, points, and their links to spaces and points.

pub mod equipment;
pub mod site;
pub mod taxonomy;
pub mod tenancy;
