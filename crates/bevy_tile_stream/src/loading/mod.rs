//! Chunk loading - filling chunks with tile data from a world directory.
//!
//! The [`ChunkLoader`] trait is the pluggable decode step. [`ChunkSource`]
//! wraps a loader with the world's [`EmptyChunkSet`] and is shared between
//! the main thread (blocking window misses) and the cache producer thread.

mod empty;
mod png;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fmt, io};

use bevy::log::warn;
pub use empty::{EMPTY_CHUNK_LIST, EmptyChunkSet};
pub use png::ImageChunkLoader;

use crate::coords::ChunkPos;
use crate::primitives::Chunk;

/// Trait for filling chunks with tile data.
///
/// The chunk passed in is blank and already carries its position and size.
///
/// The `Send + Sync` bounds let the cache producer load on its own thread.
pub trait ChunkLoader: Send + Sync {
  /// Fills `chunk` with data read from `world_dir`.
  fn load(&self, world_dir: &Path, chunk: &mut Chunk) -> Result<(), LoadError>;
}

/// Error type for chunk loading.
#[derive(Debug)]
pub enum LoadError {
  /// No data file exists for the chunk.
  Missing(PathBuf),
  /// Reading the data file failed.
  Io(io::Error),
  /// The data file could not be decoded.
  Decode(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for LoadError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Missing(path) => write!(f, "missing chunk data: {}", path.display()),
      Self::Io(e) => write!(f, "I/O error: {e}"),
      Self::Decode(e) => write!(f, "decode error: {e}"),
    }
  }
}

impl Error for LoadError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Io(e) => Some(e),
      Self::Decode(e) => Some(&**e),
      Self::Missing(_) => None,
    }
  }
}

impl From<io::Error> for LoadError {
  fn from(err: io::Error) -> Self {
    Self::Io(err)
  }
}

/// Loader plus the per-world data it needs.
pub struct ChunkSource {
  loader: Arc<dyn ChunkLoader>,
  empty: EmptyChunkSet,
  world_dir: PathBuf,
  chunk_size: u32,
}

impl ChunkSource {
  /// Creates a source for one world.
  pub fn new(
    loader: Arc<dyn ChunkLoader>,
    empty: EmptyChunkSet,
    world_dir: impl Into<PathBuf>,
    chunk_size: u32,
  ) -> Self {
    Self {
      loader,
      empty,
      world_dir: world_dir.into(),
      chunk_size,
    }
  }

  /// Returns a fully populated chunk for `pos`.
  ///
  /// Known-empty positions are synthesized blank without touching the
  /// loader. Load errors are logged and also yield a blank chunk.
  pub fn load(&self, pos: ChunkPos) -> Chunk {
    self.load_in(&self.world_dir, pos)
  }

  /// Like [`load`](Self::load), reading chunk data from `world_dir`.
  pub fn load_in(&self, world_dir: &Path, pos: ChunkPos) -> Chunk {
    let mut chunk = Chunk::blank(pos, self.chunk_size);
    if self.empty.contains(pos) {
      return chunk;
    }

    if let Err(e) = self.loader.load(world_dir, &mut chunk) {
      warn!("Chunk {:?} failed to load, using blank chunk: {e}", pos);
      return Chunk::blank(pos, self.chunk_size);
    }
    chunk
  }

  pub fn world_dir(&self) -> &Path {
    &self.world_dir
  }

  pub fn chunk_size(&self) -> u32 {
    self.chunk_size
  }

  pub fn empty_chunks(&self) -> &EmptyChunkSet {
    &self.empty
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::tile::{ElevationLevels, Tile};

  struct CountingLoader {
    calls: AtomicUsize,
    fail: bool,
  }

  impl ChunkLoader for CountingLoader {
    fn load(&self, world_dir: &Path, chunk: &mut Chunk) -> Result<(), LoadError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail {
        return Err(LoadError::Missing(world_dir.join("nope.png")));
      }
      let tile = Tile::from_elevation(200, &ElevationLevels::new(1, 2, 3));
      chunk.set_tile(0, 0, tile);
      Ok(())
    }
  }

  fn source(fail: bool, empty: &[ChunkPos]) -> (Arc<CountingLoader>, ChunkSource) {
    let loader = Arc::new(CountingLoader {
      calls: AtomicUsize::new(0),
      fail,
    });
    let source = ChunkSource::new(
      loader.clone(),
      EmptyChunkSet::from_positions(empty.iter().copied()),
      "world",
      4,
    );
    (loader, source)
  }

  #[test]
  fn empty_positions_skip_the_loader() {
    let (loader, source) = source(false, &[ChunkPos::new(2, 3)]);

    let chunk = source.load(ChunkPos::new(2, 3));
    assert!(chunk.is_blank());
    assert_eq!(chunk.pos(), ChunkPos::new(2, 3));
    assert_eq!(loader.calls.load(Ordering::SeqCst), 0);

    let chunk = source.load(ChunkPos::new(1, 1));
    assert!(!chunk.is_blank());
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn load_errors_degrade_to_blank() {
    let (loader, source) = source(true, &[]);
    let chunk = source.load(ChunkPos::new(0, 0));
    assert!(chunk.is_blank());
    assert_eq!(chunk.size(), 4);
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
  }
}
