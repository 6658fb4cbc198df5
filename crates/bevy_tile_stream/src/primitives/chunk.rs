//! Chunk - a square block of tiles at a global chunk position.
//!
//! A chunk is created blank for a position, then filled in place by a
//! [`ChunkLoader`](crate::loading::ChunkLoader). It is owned by exactly one
//! container at a time: the staging buffer while in flight from the producer,
//! the [`ChunkPool`](crate::pool::ChunkPool) once consumed.

use crate::coords::ChunkPos;
use crate::tile::Tile;

/// A chunk of the world containing tile data.
#[derive(Clone, Debug)]
pub struct Chunk {
  /// Global position this chunk was loaded for.
  pos: ChunkPos,
  /// Edge length in tiles.
  size: u32,
  /// Row-major tiles, indexed as `y * size + x`.
  tiles: Box<[Tile]>,
}

impl Chunk {
  /// Creates a chunk with every tile at elevation 0.
  pub fn blank(pos: ChunkPos, size: u32) -> Self {
    Self {
      pos,
      size,
      tiles: vec![Tile::BLANK; size as usize * size as usize].into_boxed_slice(),
    }
  }

  /// Returns the global position of this chunk.
  #[inline]
  pub fn pos(&self) -> ChunkPos {
    self.pos
  }

  /// Returns the edge length in tiles.
  #[inline]
  pub fn size(&self) -> u32 {
    self.size
  }

  /// Returns the tile at chunk-local `(x, y)`.
  ///
  /// # Panics
  /// Panics if `(x, y)` is outside the chunk.
  #[inline]
  pub fn tile(&self, x: u32, y: u32) -> &Tile {
    match self.get_tile(x, y) {
      Some(tile) => tile,
      None => panic!(
        "chunk-local tile ({x}, {y}) out of range for chunk {:?} of size {}",
        self.pos, self.size
      ),
    }
  }

  /// Returns the tile at chunk-local `(x, y)`, or `None` if out of range.
  #[inline]
  pub fn get_tile(&self, x: u32, y: u32) -> Option<&Tile> {
    if x < self.size && y < self.size {
      Some(&self.tiles[self.index(x, y)])
    } else {
      None
    }
  }

  /// Sets the tile at chunk-local `(x, y)`.
  ///
  /// # Panics
  /// Panics if `(x, y)` is outside the chunk.
  pub fn set_tile(&mut self, x: u32, y: u32, tile: Tile) {
    assert!(
      x < self.size && y < self.size,
      "chunk-local tile ({x}, {y}) out of range for chunk {:?} of size {}",
      self.pos,
      self.size
    );
    let index = self.index(x, y);
    self.tiles[index] = tile;
  }

  /// All tiles in row-major order.
  pub fn tiles(&self) -> &[Tile] {
    &self.tiles
  }

  /// Returns true if every tile is at elevation 0.
  pub fn is_blank(&self) -> bool {
    self.tiles.iter().all(|t| t.elevation == 0)
  }

  #[inline]
  fn index(&self, x: u32, y: u32) -> usize {
    y as usize * self.size as usize + x as usize
  }
}
