//! Tiles decoded from chunk elevation data.

use serde::{Deserialize, Serialize};

/// Elevation thresholds used to classify tiles.
///
/// Each level is inclusive: an elevation equal to `sea` is still sea.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevationLevels {
  pub sea: u8,
  pub shallows: u8,
  pub sand: u8,
}

impl ElevationLevels {
  pub const fn new(sea: u8, shallows: u8, sand: u8) -> Self {
    Self {
      sea,
      shallows,
      sand,
    }
  }
}

/// Terrain classification of a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileKind {
  #[default]
  Sea,
  Shallows,
  Sand,
  Grass,
}

/// A single world tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tile {
  pub elevation: u8,
  pub kind: TileKind,
}

impl Tile {
  /// Tile used for blank chunks and cells outside the world.
  pub const BLANK: Tile = Tile {
    elevation: 0,
    kind: TileKind::Sea,
  };

  /// Decodes an 8-bit elevation sample into a tile.
  pub fn from_elevation(elevation: u8, levels: &ElevationLevels) -> Self {
    let kind = if elevation <= levels.sea {
      TileKind::Sea
    } else if elevation <= levels.shallows {
      TileKind::Shallows
    } else if elevation <= levels.sand {
      TileKind::Sand
    } else {
      TileKind::Grass
    };
    Self { elevation, kind }
  }

  /// Returns true for sea and shallows.
  pub fn is_water(&self) -> bool {
    matches!(self.kind, TileKind::Sea | TileKind::Shallows)
  }
}
