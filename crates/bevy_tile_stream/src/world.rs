//! A streaming session for one world.
//!
//! [`StreamingWorld`] owns the chunk pool, the window tracker and the
//! background cache for the lifetime of an opened world. Dropping it tears
//! the cache down and joins the producer thread.

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bevy::log::info;
use bevy::math::{IVec2, Vec2};
use bevy::prelude::Resource;

use crate::cache::{CacheCoordinator, ChunkCache};
use crate::config::{ConfigError, StreamingConfig};
use crate::coords::{ChunkPos, LocalTilePos, TilePos, WorldDims};
use crate::diagnostics::StreamingStats;
use crate::loading::{ChunkLoader, ChunkSource, EmptyChunkSet, ImageChunkLoader};
use crate::pool::ChunkPool;
use crate::tile::Tile;
use crate::window::{WindowError, WindowTracker};
use crate::world_type::{WorldType, WorldTypeError};

/// Error type for opening a world.
#[derive(Debug)]
pub enum StreamingError {
  /// The streaming config is invalid.
  Config(ConfigError),
  /// The world descriptor could not be loaded.
  WorldType(WorldTypeError),
  /// The world has no chunks.
  EmptyWorld(WorldDims),
}

impl fmt::Display for StreamingError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Config(e) => write!(f, "{e}"),
      Self::WorldType(e) => write!(f, "{e}"),
      Self::EmptyWorld(dims) => {
        write!(f, "world is {}x{} chunks, expected at least 1x1", dims.width, dims.height)
      }
    }
  }
}

impl Error for StreamingError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Config(e) => Some(e),
      Self::WorldType(e) => Some(e),
      Self::EmptyWorld(_) => None,
    }
  }
}

impl From<ConfigError> for StreamingError {
  fn from(err: ConfigError) -> Self {
    Self::Config(err)
  }
}

impl From<WorldTypeError> for StreamingError {
  fn from(err: WorldTypeError) -> Self {
    Self::WorldType(err)
  }
}

/// The open world: pool, window and cache.
#[derive(Resource)]
pub struct StreamingWorld {
  config: StreamingConfig,
  world_type: WorldType,
  source: Arc<ChunkSource>,
  pool: ChunkPool,
  window: WindowTracker,
  cache: ChunkCache,
  closed: bool,
}

impl StreamingWorld {
  /// Opens a world and builds the initial window around its spawn chunk.
  pub fn open(
    config: StreamingConfig,
    world_type: WorldType,
    loader: Arc<dyn ChunkLoader>,
  ) -> Result<Self, StreamingError> {
    config.validate()?;
    let dims = world_type.dimensions;
    if dims.width <= 0 || dims.height <= 0 {
      return Err(StreamingError::EmptyWorld(dims));
    }

    let empty = EmptyChunkSet::load(&world_type.directory);
    let source = Arc::new(ChunkSource::new(
      loader,
      empty,
      world_type.directory.clone(),
      config.chunk_size,
    ));
    let coordinator = Arc::new(CacheCoordinator::new(
      config.maximum_chunks_in_cache,
      config.chunk_cache_range,
      config.chunk_cache_log,
    ));

    let center = dims.clamp(world_type.spawn_chunk(config.chunk_size));
    let mut pool = ChunkPool::new(config.maximum_chunks_in_pool);
    let mut window = WindowTracker::new(
      config.window_extent(),
      config.chunk_size,
      config.tile_size,
      center,
      Arc::clone(&coordinator),
      world_type.directory.clone(),
      dims,
    );
    window.recompute(center, &mut pool, &source, config.maximum_chunks_in_pool);

    info!(
      "Opened world '{}' ({}x{} chunks, {} known empty) at chunk {},{}",
      world_type.display_name,
      dims.width,
      dims.height,
      source.empty_chunks().len(),
      center.x,
      center.y
    );

    let cache = ChunkCache::new(coordinator, Arc::clone(&source));
    Ok(Self {
      config,
      world_type,
      source,
      pool,
      window,
      cache,
      closed: false,
    })
  }

  /// Opens the world stored in `dir`, decoding chunk images with
  /// [`ImageChunkLoader`].
  pub fn open_dir(config: StreamingConfig, dir: impl AsRef<Path>) -> Result<Self, StreamingError> {
    let world_type = WorldType::load(dir)?;
    let loader = Arc::new(ImageChunkLoader::new(world_type.levels));
    Self::open(config, world_type, loader)
  }

  /// Per-frame cache step: consumes produced chunks and starts the pending
  /// order. Returns the number of chunks added to the pool.
  pub fn tick(&mut self) -> usize {
    if self.closed {
      return 0;
    }
    let referenced = self.window.referenced_positions();
    self
      .cache
      .manage(&mut self.pool, &referenced, self.config.maximum_chunks_in_pool)
  }

  /// Moves the window center by `delta` chunks.
  pub fn shift_window(&mut self, delta: IVec2) -> IVec2 {
    let center = self.window.center().offset(delta);
    self.recenter(center)
  }

  /// Recenters the window on `center`, returning the movement delta.
  pub fn recenter(&mut self, center: ChunkPos) -> IVec2 {
    if self.closed {
      return IVec2::ZERO;
    }
    self.window.recompute(
      center,
      &mut self.pool,
      &self.source,
      self.config.maximum_chunks_in_pool,
    )
  }

  /// Recenters if `local_world_pos` has left the center cell.
  ///
  /// Returns the chunk delta applied, if any. Entities positioned in
  /// window-local space must be shifted by `-delta` chunks.
  pub fn track(&mut self, local_world_pos: Vec2) -> Option<IVec2> {
    let delta = self.window.chunk_delta_for(local_world_pos);
    if delta == IVec2::ZERO {
      return None;
    }
    Some(self.shift_window(delta))
  }

  /// Drops every loaded chunk and the cache's pending work, then rebuilds
  /// the window in place. Used when the world's data changes on disk.
  pub fn rebuild(&mut self) {
    if self.closed {
      return;
    }
    self.cache.coordinator().reset();
    self.window.clear();
    self.pool.clear();
    let center = self.window.center();
    self.recenter(center);
  }

  /// Tile at a window-local tile position.
  pub fn tile(&self, local: LocalTilePos) -> Result<&Tile, WindowError> {
    self.window.tile(local, &self.pool)
  }

  /// Global tile under a window-local world position.
  pub fn global_tile_position(&self, local_world_pos: Vec2) -> TilePos {
    self.window.global_tile_position(local_world_pos)
  }

  /// Chunk the window is centered on.
  pub fn global_chunk_position(&self) -> ChunkPos {
    self.window.center()
  }

  /// Window-local world position of the world's spawn tile.
  pub fn spawn_local_position(&self) -> Vec2 {
    self.window.local_world_position(self.world_type.spawn_position)
  }

  pub fn stats(&self) -> StreamingStats {
    let coordinator = self.cache.coordinator();
    StreamingStats {
      center: self.window.center(),
      origin: self.window.origin(),
      pool_len: self.pool.len(),
      pool_capacity: self.config.maximum_chunks_in_pool,
      pool_positions: self.pool.positions().collect(),
      staged: coordinator.staged_len(),
      producing: coordinator.is_producing(),
      pending_order: coordinator.has_pending_order(),
    }
  }

  pub fn config(&self) -> &StreamingConfig {
    &self.config
  }

  pub fn world_type(&self) -> &WorldType {
    &self.world_type
  }

  pub fn pool(&self) -> &ChunkPool {
    &self.pool
  }

  pub fn window(&self) -> &WindowTracker {
    &self.window
  }

  pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
    self.cache.coordinator()
  }

  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// Shuts the cache down, joins the producer and releases all chunks.
  pub fn close(&mut self) {
    if self.closed {
      return;
    }
    self.cache.shutdown();
    self.window.clear();
    self.pool.clear();
    self.closed = true;
    info!("Closed world '{}'", self.world_type.display_name);
  }
}

impl Drop for StreamingWorld {
  fn drop(&mut self) {
    self.close();
  }
}
