//! Tile Stream - bounded chunk streaming for large tile worlds, as a Bevy
//! plugin.
//!
//! A world too large to hold in memory is split into square chunks stored
//! on disk. Only a small window of chunks around a tracked position is
//! resident, plus a bounded pool of recently used chunks. A single
//! background producer prefetches the neighborhood of the latest position
//! into a bounded staging buffer that the main thread drains every frame.
//!
//! The layers, leaf first:
//! - [`Chunk`], [`Tile`] and the coordinate types in [`coords`]
//! - [`ChunkLoader`] / [`ChunkSource`]: decoding chunk data, known-empty
//!   chunks
//! - [`ChunkPool`]: recency-ordered chunk storage with usage-aware eviction
//! - [`WindowTracker`]: the local window of pool handles
//! - [`cache`]: the order/produce/drain protocol with the producer thread
//! - [`StreamingWorld`]: one open world session
//! - [`TileStreamPlugin`]: Bevy systems, commands and components

pub mod cache;
pub mod config;
pub mod coords;
pub mod diagnostics;
pub mod loading;
pub mod plugin;
pub mod pool;
pub mod primitives;
pub mod tile;
pub mod window;
pub mod world;
pub mod world_type;

pub use cache::{
  CacheCoordinator, CacheOrder, CancelToken, ChunkCache, RunReport, StageOutcome,
};
pub use config::{ConfigError, MAX_CHUNK_SIZE, StreamingConfig};
pub use coords::{ChunkPos, LocalTilePos, TilePos, WindowExtent, WorldDims};
pub use diagnostics::StreamingStats;
pub use loading::{ChunkLoader, ChunkSource, EmptyChunkSet, ImageChunkLoader, LoadError};
pub use plugin::{
  CloseWorld, OpenWorld, TileStreamPlugin, WindowAnchor, WindowLocal, WindowShifted,
  manage_chunk_cache, track_window_anchor,
};
pub use pool::{ChunkHandle, ChunkPool};
pub use primitives::Chunk;
pub use tile::{ElevationLevels, Tile, TileKind};
pub use window::{WindowError, WindowTracker};
pub use world::{StreamingError, StreamingWorld};
pub use world_type::{WorldType, WorldTypeError};
