//! Entity kinds and the fixed dependency order of migration stages.
//!
//! Every entity kind is migrated by exactly one stage. Stages run in
//! [`EntityKind::STAGE_ORDER`], which is a topological order of the
//! foreign-key graph described by [`EntityKind::depends_on`]: a kind's
//! surrogate keys always exist in the target before any dependent kind is
//! loaded.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result};

/// One migrated entity kind.
///
/// Variants are declared in stage order, so the derived [`Ord`] matches
/// [`EntityKind::STAGE_ORDER`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
  IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum EntityKind {
  Type,
  Client,
  Community,
  AssetType,
  Subcommunity,
  Building,
  Space,
  Asset,
  AssetSpaceLink,
  Point,
  AssetPointLink,
  AssetTypePointLink,
}

static ORDER: [EntityKind; 12] = EntityKind::STAGE_ORDER;

impl EntityKind {
  /// The fixed topological order in which stages run.
  pub const STAGE_ORDER: [EntityKind; 12] = [
    EntityKind::Type,
    EntityKind::Client,
    EntityKind::Community,
    EntityKind::AssetType,
    EntityKind::Subcommunity,
    EntityKind::Building,
    EntityKind::Space,
    EntityKind::Asset,
    EntityKind::AssetSpaceLink,
    EntityKind::Point,
    EntityKind::AssetPointLink,
    EntityKind::AssetTypePointLink,
  ];

  /// Parse a stage name. Accepts the kebab-case form (`asset-type`) as well as
  /// snake case (`asset_type`), case-insensitively.
  pub fn parse(name: &str) -> Result<Self> {
    let normalised = name.trim().replace('_', "-");
    EntityKind::from_str(&normalised)
      .map_err(|_| Error::UnknownStage(name.to_owned()))
  }

  /// The stage name used on the command line and in the staging directory.
  pub fn stage_name(self) -> &'static str { self.into() }

  /// Zero-based position in [`EntityKind::STAGE_ORDER`].
  pub fn position(self) -> usize {
    ORDER
      .iter()
      .position(|k| *k == self)
      .unwrap_or_default()
  }

  /// Every stage that runs before this one.
  pub fn preceding(self) -> &'static [EntityKind] {
    &ORDER[..self.position()]
  }

  /// This stage and every stage after it.
  pub fn from_here(self) -> &'static [EntityKind] {
    &ORDER[self.position()..]
  }

  /// Just this stage, as a slice of the stage order.
  pub fn single(self) -> &'static [EntityKind] {
    std::slice::from_ref(&ORDER[self.position()])
  }

  /// The kinds whose surrogate keys rows of this kind reference.
  pub fn depends_on(self) -> &'static [EntityKind] {
    use EntityKind::*;
    match self {
      Type | Client => &[],
      Community => &[Client],
      AssetType => &[Type],
      Subcommunity => &[Community],
      Building => &[Subcommunity],
      Space => &[Building],
      Asset => &[AssetType, Space, Building],
      AssetSpaceLink => &[Asset, Space],
      Point => &[Asset],
      AssetPointLink => &[Asset, Point],
      AssetTypePointLink => &[AssetType, Type],
    }
  }

  /// The relational table rows of this kind are loaded into.
  pub fn table(self) -> &'static str {
    use EntityKind::*;
    match self {
      Type => "types",
      Client => "clients",
      Community => "communities",
      AssetType => "asset_type",
      Subcommunity => "subcommunities",
      Building => "buildings",
      Space => "spaces",
      Asset => "assets",
      AssetSpaceLink => "asset_spaces",
      Point => "points",
      AssetPointLink => "asset_points",
      AssetTypePointLink => "asset_type_points",
    }
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn stage_order_matches_declaration_order() {
    let declared: Vec<_> = EntityKind::iter().collect();
    assert_eq!(declared, EntityKind::STAGE_ORDER.to_vec());
  }

  #[test]
  fn every_dependency_precedes_its_dependent() {
    for kind in EntityKind::STAGE_ORDER {
      for dep in kind.depends_on() {
        assert!(
          dep.position() < kind.position(),
          "{dep} must run before {kind}"
        );
      }
    }
  }

  #[test]
  fn parse_accepts_kebab_snake_and_mixed_case() {
    assert_eq!(EntityKind::parse("asset-type").unwrap(), EntityKind::AssetType);
    assert_eq!(EntityKind::parse("asset_type").unwrap(), EntityKind::AssetType);
    assert_eq!(
      EntityKind::parse("Asset-Type-Point-Link").unwrap(),
      EntityKind::AssetTypePointLink
    );
  }

  #[test]
  fn parse_rejects_unknown_names() {
    let err = EntityKind::parse("tenant").unwrap_err();
    assert!(matches!(err, Error::UnknownStage(ref s) if s == "tenant"));
  }

  #[test]
  fn stage_name_round_trips() {
    for kind in EntityKind::STAGE_ORDER {
      assert_eq!(EntityKind::parse(kind.stage_name()).unwrap(), kind);
      assert_eq!(kind.to_string(), kind.stage_name());
    }
  }

  #[test]
  fn preceding_and_from_here_partition_the_order() {
    let asset = EntityKind::Asset;
    assert_eq!(asset.preceding().len() + asset.from_here().len(), 12);
    assert_eq!(asset.from_here()[0], EntityKind::Asset);
    assert!(asset.preceding().contains(&EntityKind::Building));
    assert!(EntityKind::Type.preceding().is_empty());
  }
}
