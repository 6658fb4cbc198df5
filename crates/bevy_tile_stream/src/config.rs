//! Streaming configuration.
//!
//! Loaded from TOML. Missing keys fall back to [`StreamingConfig::default`].

use std::error::Error;
use std::path::Path;
use std::{fmt, io};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::coords::WindowExtent;

/// Largest accepted chunk edge in tiles.
pub const MAX_CHUNK_SIZE: u32 = 4096;

/// Tunables for the streaming layer.
#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
  /// Tiles per chunk edge.
  pub chunk_size: u32,
  /// World units per tile edge.
  pub tile_size: f32,
  /// Local window edge length in chunks.
  pub local_world_size: u32,
  /// Capacity of the producer's staging buffer.
  pub maximum_chunks_in_cache: usize,
  /// Pool size the eviction pass trims down to.
  pub maximum_chunks_in_pool: usize,
  /// Producer search radius in chunks around the order center.
  pub chunk_cache_range: u32,
  /// Emit a debug line for every cache state transition.
  pub chunk_cache_log: bool,
}

impl Default for StreamingConfig {
  fn default() -> Self {
    Self {
      chunk_size: 128,
      tile_size: 16.0,
      local_world_size: 3,
      maximum_chunks_in_cache: 16,
      maximum_chunks_in_pool: 48,
      chunk_cache_range: 3,
      chunk_cache_log: false,
    }
  }
}

impl StreamingConfig {
  /// Parses a config from TOML text.
  pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(text)?;
    Ok(config)
  }

  /// Reads and parses a config file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_toml_str(&text)
  }

  /// Rejects non-positive values and chunks wider than [`MAX_CHUNK_SIZE`].
  pub fn validate(&self) -> Result<(), ConfigError> {
    let checks: [(&'static str, bool); 6] = [
      ("chunk_size", self.chunk_size > 0),
      ("tile_size", self.tile_size > 0.0),
      ("local_world_size", self.local_world_size > 0),
      ("maximum_chunks_in_cache", self.maximum_chunks_in_cache > 0),
      ("maximum_chunks_in_pool", self.maximum_chunks_in_pool > 0),
      ("chunk_cache_range", self.chunk_cache_range > 0),
    ];
    match checks.into_iter().find(|(_, ok)| !ok) {
      Some((field, _)) => Err(ConfigError::NonPositive { field }),
      None if self.chunk_size > MAX_CHUNK_SIZE => Err(ConfigError::ChunkTooLarge {
        size: self.chunk_size,
      }),
      None => Ok(()),
    }
  }

  /// Local window extent in chunks.
  pub fn window_extent(&self) -> WindowExtent {
    WindowExtent::square(self.local_world_size)
  }

  /// Chunk edge length in world units.
  pub fn chunk_world_size(&self) -> f32 {
    self.chunk_size as f32 * self.tile_size
  }
}

/// Error type for config loading.
#[derive(Debug)]
pub enum ConfigError {
  /// Reading the config file failed.
  Io(io::Error),
  /// The TOML was malformed or had wrong types.
  Parse(toml::de::Error),
  /// A numeric field was zero or negative.
  NonPositive { field: &'static str },
  /// `chunk_size` exceeds [`MAX_CHUNK_SIZE`].
  ChunkTooLarge { size: u32 },
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(e) => write!(f, "I/O error: {e}"),
      Self::Parse(e) => write!(f, "invalid streaming config: {e}"),
      Self::NonPositive { field } => write!(f, "`{field}` must be positive"),
      Self::ChunkTooLarge { size } => {
        write!(f, "`chunk_size` {size} exceeds the maximum of {MAX_CHUNK_SIZE}")
      }
    }
  }
}

impl Error for ConfigError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Io(e) => Some(e),
      Self::Parse(e) => Some(e),
      Self::NonPositive { .. } | Self::ChunkTooLarge { .. } => None,
    }
  }
}

impl From<io::Error> for ConfigError {
  fn from(err: io::Error) -> Self {
    Self::Io(err)
  }
}

impl From<toml::de::Error> for ConfigError {
  fn from(err: toml::de::Error) -> Self {
    Self::Parse(err)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_keys_use_defaults() {
    let config = StreamingConfig::from_toml_str("chunk_size = 8\nchunk_cache_log = true\n").unwrap();
    assert_eq!(config.chunk_size, 8);
    assert!(config.chunk_cache_log);
    assert_eq!(config.local_world_size, StreamingConfig::default().local_world_size);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn zero_values_are_rejected() {
    let config = StreamingConfig {
      maximum_chunks_in_pool: 0,
      ..Default::default()
    };
    match config.validate() {
      Err(ConfigError::NonPositive { field }) => assert_eq!(field, "maximum_chunks_in_pool"),
      other => panic!("expected NonPositive, got {other:?}"),
    }

    let config = StreamingConfig {
      tile_size: -1.0,
      ..Default::default()
    };
    assert!(matches!(
      config.validate(),
      Err(ConfigError::NonPositive { field: "tile_size" })
    ));
  }

  #[test]
  fn oversized_chunks_are_rejected() {
    let config = StreamingConfig {
      chunk_size: 65536,
      ..Default::default()
    };
    assert!(matches!(
      config.validate(),
      Err(ConfigError::ChunkTooLarge { size: 65536 })
    ));

    let config = StreamingConfig {
      chunk_size: MAX_CHUNK_SIZE,
      ..Default::default()
    };
    assert!(config.validate().is_ok());
  }

  #[test]
  fn wrong_types_are_parse_errors() {
    let err = StreamingConfig::from_toml_str("chunk_size = \"big\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }

  #[test]
  fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("streaming.toml");
    std::fs::write(&path, "tile_size = 2.5\nmaximum_chunks_in_cache = 4\n").unwrap();

    let config = StreamingConfig::load(&path).unwrap();
    assert_eq!(config.tile_size, 2.5);
    assert_eq!(config.maximum_chunks_in_cache, 4);

    let missing = StreamingConfig::load(dir.path().join("nope.toml"));
    assert!(matches!(missing, Err(ConfigError::Io(_))));
  }
}
