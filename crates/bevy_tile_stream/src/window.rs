//! Local window tracking.
//!
//! The window is a fixed grid of chunk cells around the tracked chunk. Each
//! cell holds a [`ChunkHandle`] into the pool, or `None` when it lies
//! outside the world. Recomputing the window touches or loads every in-world
//! cell, evicts pool entries no cell references, and places a fresh cache
//! order for the new neighborhood.
//!
//! Window-local world space has its origin at the corner of the window's
//! first cell. Global positions are derived from the window origin plus a
//! local offset on demand and never stored.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bevy::math::{IVec2, Vec2};

use crate::cache::{CacheCoordinator, CacheOrder};
use crate::coords::{ChunkPos, LocalTilePos, TilePos, WindowExtent, WorldDims};
use crate::loading::ChunkSource;
use crate::pool::{ChunkHandle, ChunkPool};
use crate::tile::Tile;

/// Error type for window tile lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowError {
  /// The position lies outside the window.
  OutOfRange(LocalTilePos),
  /// The cell's chunk is no longer in the pool.
  Evicted(ChunkPos),
}

impl fmt::Display for WindowError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::OutOfRange(pos) => write!(f, "local tile ({}, {}) is outside the window", pos.x, pos.y),
      Self::Evicted(pos) => write!(f, "chunk {pos:?} was evicted while referenced"),
    }
  }
}

impl Error for WindowError {}

/// Tracks which pooled chunks make up the local window.
pub struct WindowTracker {
  extent: WindowExtent,
  chunk_size: u32,
  tile_size: f32,
  /// Chunk the window is centered on.
  center: ChunkPos,
  /// Global position of cell (0, 0).
  origin: ChunkPos,
  /// Row-major cells, `None` outside the world.
  cells: Vec<Option<ChunkHandle>>,
  coordinator: Arc<CacheCoordinator>,
  world_dir: PathBuf,
  dims: WorldDims,
}

impl WindowTracker {
  /// Creates an empty window centered on `center`.
  ///
  /// No chunks are referenced until the first [`recompute`](Self::recompute).
  pub fn new(
    extent: WindowExtent,
    chunk_size: u32,
    tile_size: f32,
    center: ChunkPos,
    coordinator: Arc<CacheCoordinator>,
    world_dir: impl Into<PathBuf>,
    dims: WorldDims,
  ) -> Self {
    Self {
      extent,
      chunk_size,
      tile_size,
      center,
      origin: extent.origin_for(center),
      cells: vec![None; extent.cell_count()],
      coordinator,
      world_dir: world_dir.into(),
      dims,
    }
  }

  /// Recenters the window on `new_center`.
  ///
  /// Every in-world cell is touched in the pool (loading synchronously on a
  /// miss), then unreferenced chunks are evicted down toward `pool_cap` and
  /// a cache order for the new neighborhood is placed. Returns the movement
  /// delta in chunks.
  pub fn recompute(
    &mut self,
    new_center: ChunkPos,
    pool: &mut ChunkPool,
    source: &ChunkSource,
    pool_cap: usize,
  ) -> IVec2 {
    let delta = new_center.delta_from(self.center);
    self.center = new_center;
    self.origin = self.extent.origin_for(new_center);

    for (idx, pos) in self.extent.cells(self.origin) {
      self.cells[idx] = if self.dims.contains(pos) {
        Some(pool.touch_or_insert(pos, source))
      } else {
        None
      };
    }

    let referenced = self.referenced_positions();
    let evicted = pool.drop_unreferenced(&referenced, pool_cap);
    if !evicted.is_empty() {
      self.coordinator.trace(format_args!(
        "window recompute evicted {} chunks",
        evicted.len()
      ));
    }

    self.coordinator.place_order(CacheOrder {
      world_directory: self.world_dir.clone(),
      world_dimensions: self.dims,
      known_resident: pool.positions().collect(),
      center: new_center,
    });
    delta
  }

  /// Positions of every chunk a cell currently references.
  pub fn referenced_positions(&self) -> HashSet<ChunkPos> {
    self
      .extent
      .cells(self.origin)
      .filter(|&(idx, _)| self.cells[idx].is_some())
      .map(|(_, pos)| pos)
      .collect()
  }

  /// Looks up a tile by window-local tile position.
  ///
  /// Cells outside the world read as [`Tile::BLANK`].
  pub fn tile<'p>(&self, local: LocalTilePos, pool: &'p ChunkPool) -> Result<&'p Tile, WindowError> {
    let size = self.chunk_size as i32;
    let width = self.extent.width as i32 * size;
    let height = self.extent.height as i32 * size;
    if local.x < 0 || local.y < 0 || local.x >= width || local.y >= height {
      return Err(WindowError::OutOfRange(local));
    }

    let cell = (local.y / size) as usize * self.extent.width as usize + (local.x / size) as usize;
    let Some(handle) = self.cells[cell] else {
      return Ok(&Tile::BLANK);
    };
    let chunk = pool.get(handle).ok_or_else(|| {
      let pos = self.origin.offset(IVec2::new(local.x / size, local.y / size));
      WindowError::Evicted(pos)
    })?;
    Ok(chunk.tile((local.x % size) as u32, (local.y % size) as u32))
  }

  /// Chunk delta between the cell containing `local_world_pos` and the
  /// center cell. Non-zero once a tracked position leaves the center cell.
  pub fn chunk_delta_for(&self, local_world_pos: Vec2) -> IVec2 {
    let chunk_world = self.chunk_size as f32 * self.tile_size;
    let cell = (local_world_pos / chunk_world).floor().as_ivec2();
    cell - self.extent.center_cell()
  }

  /// Global tile under a window-local world position.
  pub fn global_tile_position(&self, local_world_pos: Vec2) -> TilePos {
    let base = self.origin.to_tile(self.chunk_size);
    let offset = (local_world_pos / self.tile_size).floor();
    TilePos::new(base.x + offset.x as i64, base.y + offset.y as i64)
  }

  /// Window-local world position of the center of a global tile.
  pub fn local_world_position(&self, tile: TilePos) -> Vec2 {
    let base = self.origin.to_tile(self.chunk_size);
    Vec2::new(
      (tile.x - base.x) as f32 + 0.5,
      (tile.y - base.y) as f32 + 0.5,
    ) * self.tile_size
  }

  /// Chunk the window is centered on.
  pub fn center(&self) -> ChunkPos {
    self.center
  }

  /// Global position of the window's first cell.
  pub fn origin(&self) -> ChunkPos {
    self.origin
  }

  pub fn extent(&self) -> WindowExtent {
    self.extent
  }

  /// Handle held by the cell at `(lx, ly)`.
  pub fn cell(&self, lx: u32, ly: u32) -> Option<ChunkHandle> {
    if lx >= self.extent.width || ly >= self.extent.height {
      return None;
    }
    self.cells[(ly * self.extent.width + lx) as usize]
  }

  /// Drops every cell reference.
  pub fn clear(&mut self) {
    self.cells.iter_mut().for_each(|cell| *cell = None);
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;
  use crate::loading::{ChunkLoader, EmptyChunkSet, LoadError};
  use crate::primitives::Chunk;
  use crate::tile::ElevationLevels;

  /// Writes the chunk's x coordinate into every tile's elevation.
  struct PositionLoader;

  impl ChunkLoader for PositionLoader {
    fn load(&self, _world_dir: &Path, chunk: &mut Chunk) -> Result<(), LoadError> {
      let levels = ElevationLevels::default();
      let tile = Tile::from_elevation(chunk.pos().x as u8 + 1, &levels);
      for y in 0..chunk.size() {
        for x in 0..chunk.size() {
          chunk.set_tile(x, y, tile);
        }
      }
      Ok(())
    }
  }

  struct Fixture {
    coordinator: Arc<CacheCoordinator>,
    source: ChunkSource,
    pool: ChunkPool,
    window: WindowTracker,
  }

  fn fixture(center: ChunkPos) -> Fixture {
    let coordinator = Arc::new(CacheCoordinator::new(4, 1, false));
    let source = ChunkSource::new(Arc::new(PositionLoader), EmptyChunkSet::default(), "w", 4);
    let window = WindowTracker::new(
      WindowExtent::square(3),
      4,
      2.0,
      center,
      coordinator.clone(),
      "w",
      WorldDims::new(10, 10),
    );
    Fixture {
      coordinator,
      source,
      pool: ChunkPool::new(4),
      window,
    }
  }

  #[test]
  fn recompute_places_order_with_pool_snapshot() {
    let mut f = fixture(ChunkPos::new(5, 5));
    let delta = f
      .window
      .recompute(ChunkPos::new(5, 5), &mut f.pool, &f.source, 4);
    assert_eq!(delta, IVec2::ZERO);
    assert_eq!(f.pool.len(), 9);

    let (order, _) = f.coordinator.begin_production().unwrap();
    assert_eq!(order.center, ChunkPos::new(5, 5));
    assert_eq!(order.world_dimensions, WorldDims::new(10, 10));
    assert_eq!(order.known_resident, f.pool.positions().collect::<HashSet<_>>());
  }

  #[test]
  fn cells_outside_world_are_blank() {
    let mut f = fixture(ChunkPos::new(0, 0));
    f.window
      .recompute(ChunkPos::new(0, 0), &mut f.pool, &f.source, 4);

    assert_eq!(f.pool.len(), 4);
    assert_eq!(f.window.referenced_positions().len(), 4);
    assert!(f.window.cell(0, 0).is_none());

    let outside = f.window.tile(LocalTilePos::new(0, 0), &f.pool).unwrap();
    assert_eq!(*outside, Tile::BLANK);
    // Cell (1, 1) is chunk (0, 0), whose tiles carry elevation x + 1.
    let inside = f.window.tile(LocalTilePos::new(5, 5), &f.pool).unwrap();
    assert_eq!(inside.elevation, 1);
  }

  #[test]
  fn tile_lookup_rejects_out_of_window() {
    let mut f = fixture(ChunkPos::new(5, 5));
    f.window
      .recompute(ChunkPos::new(5, 5), &mut f.pool, &f.source, 4);

    assert!(f.window.tile(LocalTilePos::new(11, 11), &f.pool).is_ok());
    assert_eq!(
      f.window.tile(LocalTilePos::new(12, 0), &f.pool),
      Err(WindowError::OutOfRange(LocalTilePos::new(12, 0)))
    );
    assert!(f.window.tile(LocalTilePos::new(0, -1), &f.pool).is_err());
    // Column 2 of the window is chunk x = 6.
    assert_eq!(f.window.tile(LocalTilePos::new(8, 0), &f.pool).unwrap().elevation, 7);
  }

  #[test]
  fn boundary_crossing_and_global_positions() {
    let f = fixture(ChunkPos::new(5, 5));
    // One chunk is 4 tiles of 2 units, the center cell spans [8, 16).
    assert_eq!(f.window.chunk_delta_for(Vec2::new(12.0, 12.0)), IVec2::ZERO);
    assert_eq!(f.window.chunk_delta_for(Vec2::new(16.5, 12.0)), IVec2::new(1, 0));
    assert_eq!(f.window.chunk_delta_for(Vec2::new(7.9, 3.0)), IVec2::new(-1, -1));

    // Origin chunk (4, 4) starts at tile (16, 16).
    assert_eq!(f.window.global_tile_position(Vec2::new(3.0, 0.5)), TilePos::new(17, 16));
    assert_eq!(
      f.window.local_world_position(TilePos::new(17, 16)),
      Vec2::new(3.0, 1.0)
    );
  }
}
