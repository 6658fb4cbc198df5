//! Coordinate types for the streamed world.
//!
//! Defines the coordinate spaces used by the streaming layer:
//! - [`ChunkPos`]: Global chunk grid position (i32)
//! - [`TilePos`]: Global tile position (i64)
//! - [`LocalTilePos`]: Tile position inside the local window
//! - [`WorldDims`]: World extent in chunks
//! - [`WindowExtent`]: Local window extent in chunks

use bevy::math::IVec2;
use serde::{Deserialize, Serialize};

/// Position in the global chunk grid.
///
/// Used directly as a hash key by the empty-chunk set, the chunk pool and
/// cache orders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
pub struct ChunkPos {
  pub x: i32,
  pub y: i32,
}

impl ChunkPos {
  /// Creates a new chunk position.
  pub const fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }

  /// Returns this position moved by `delta` chunks.
  pub fn offset(self, delta: IVec2) -> Self {
    Self::new(self.x + delta.x, self.y + delta.y)
  }

  /// Returns the chunk delta from `other` to `self`.
  pub fn delta_from(self, other: ChunkPos) -> IVec2 {
    IVec2::new(self.x - other.x, self.y - other.y)
  }

  /// Chebyshev distance in chunks.
  pub fn ring_distance(self, other: ChunkPos) -> u32 {
    (self.x - other.x)
      .unsigned_abs()
      .max((self.y - other.y).unsigned_abs())
  }

  /// Returns the global tile position of this chunk's first tile.
  pub fn to_tile(self, chunk_size: u32) -> TilePos {
    let size = chunk_size as i64;
    TilePos::new(self.x as i64 * size, self.y as i64 * size)
  }
}

/// Position in the global tile grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
pub struct TilePos {
  pub x: i64,
  pub y: i64,
}

impl TilePos {
  /// Creates a new tile position.
  pub const fn new(x: i64, y: i64) -> Self {
    Self { x, y }
  }

  /// Returns the chunk containing this tile.
  ///
  /// Uses floor division, so tile -1 belongs to chunk -1.
  pub fn chunk(self, chunk_size: u32) -> ChunkPos {
    let size = chunk_size as i64;
    ChunkPos::new(
      self.x.div_euclid(size) as i32,
      self.y.div_euclid(size) as i32,
    )
  }
}

/// Tile position relative to the local window origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalTilePos {
  pub x: i32,
  pub y: i32,
}

impl LocalTilePos {
  /// Creates a new local tile position.
  pub const fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }
}

/// Size of the world in chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldDims {
  pub width: i32,
  pub height: i32,
}

impl WorldDims {
  /// Creates new world dimensions.
  pub const fn new(width: i32, height: i32) -> Self {
    Self { width, height }
  }

  /// Returns true if `pos` lies in `[0, width) x [0, height)`.
  pub fn contains(&self, pos: ChunkPos) -> bool {
    pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
  }

  /// Clamps a chunk position into the world.
  pub fn clamp(&self, pos: ChunkPos) -> ChunkPos {
    ChunkPos::new(
      pos.x.clamp(0, (self.width - 1).max(0)),
      pos.y.clamp(0, (self.height - 1).max(0)),
    )
  }
}

/// Size of the local window in chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowExtent {
  pub width: u32,
  pub height: u32,
}

impl WindowExtent {
  /// Creates a square window extent.
  pub const fn square(size: u32) -> Self {
    Self {
      width: size,
      height: size,
    }
  }

  /// Number of cells in the window.
  pub const fn cell_count(&self) -> usize {
    (self.width * self.height) as usize
  }

  /// Offset of the center cell from the window origin.
  ///
  /// For the 3x3 window this is (1, 1), so the window starts one chunk
  /// before the center on each axis.
  pub fn center_cell(&self) -> IVec2 {
    IVec2::new(
      (self.width as i32 - 1) / 2,
      (self.height as i32 - 1) / 2,
    )
  }

  /// Global chunk position of the window origin for a given center.
  pub fn origin_for(&self, center: ChunkPos) -> ChunkPos {
    let c = self.center_cell();
    ChunkPos::new(center.x - c.x, center.y - c.y)
  }

  /// Iterates `(cell index, global position)` for a window at `origin`.
  ///
  /// Cells are row-major: index = `ly * width + lx`.
  pub fn cells(&self, origin: ChunkPos) -> impl Iterator<Item = (usize, ChunkPos)> {
    let width = self.width as i32;
    let height = self.height as i32;
    (0..height).flat_map(move |ly| {
      (0..width).map(move |lx| {
        (
          (ly * width + lx) as usize,
          ChunkPos::new(origin.x + lx, origin.y + ly),
        )
      })
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tile_to_chunk_uses_floor_division() {
    assert_eq!(TilePos::new(-1, 0).chunk(16), ChunkPos::new(-1, 0));
    assert_eq!(TilePos::new(15, 16).chunk(16), ChunkPos::new(0, 1));
  }

  #[test]
  fn three_wide_window_starts_one_before_center() {
    let extent = WindowExtent::square(3);
    assert_eq!(extent.origin_for(ChunkPos::new(5, 5)), ChunkPos::new(4, 4));

    let cells: Vec<_> = extent.cells(ChunkPos::new(4, 4)).collect();
    assert_eq!(cells.len(), 9);
    assert_eq!(cells[0], (0, ChunkPos::new(4, 4)));
    assert_eq!(cells[5], (5, ChunkPos::new(6, 5)));
    assert_eq!(cells[8], (8, ChunkPos::new(6, 6)));
  }

  #[test]
  fn world_dims_bounds() {
    let dims = WorldDims::new(10, 10);
    assert!(dims.contains(ChunkPos::new(0, 9)));
    assert!(!dims.contains(ChunkPos::new(-1, 3)));
    assert!(!dims.contains(ChunkPos::new(10, 3)));
    assert_eq!(dims.clamp(ChunkPos::new(12, -4)), ChunkPos::new(9, 0));
  }

  #[test]
  fn ring_distance_is_chebyshev() {
    let c = ChunkPos::new(5, 5);
    assert_eq!(c.ring_distance(c), 0);
    assert_eq!(c.ring_distance(ChunkPos::new(6, 4)), 1);
    assert_eq!(c.ring_distance(ChunkPos::new(3, 6)), 2);
  }
}
