//! World type descriptor.
//!
//! Every streamable world lives in its own directory holding a `world.toml`
//! descriptor, one `<x>_<y>.png` image per chunk and an optional
//! `emptyChunkCoords` list.
//!
//! ```toml
//! name = "earth"
//! display_name = "Earth"
//! width = 64
//! height = 32
//! sea_level = 0
//! shallows_level = 8
//! sand_level = 16
//! spawn_position = { x = 4000, y = 2000 }
//! ```

use std::error::Error;
use std::path::{Path, PathBuf};
use std::{fmt, io};

use serde::Deserialize;

use crate::coords::{ChunkPos, TilePos, WorldDims};
use crate::tile::ElevationLevels;

/// File name of the descriptor inside a world directory.
pub const WORLD_DESCRIPTOR: &str = "world.toml";

/// A world that can be streamed.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldType {
  pub name: String,
  pub display_name: String,
  /// Directory the descriptor was loaded from.
  pub directory: PathBuf,
  /// Extent in chunks.
  pub dimensions: WorldDims,
  pub levels: ElevationLevels,
  /// Spawn point in global tile coordinates.
  pub spawn_position: TilePos,
}

#[derive(Deserialize)]
struct WorldTypeFile {
  name: String,
  #[serde(default)]
  display_name: Option<String>,
  width: i32,
  height: i32,
  sea_level: u8,
  shallows_level: u8,
  sand_level: u8,
  #[serde(default)]
  spawn_position: TilePos,
}

impl WorldType {
  /// Loads `<dir>/world.toml`.
  pub fn load(dir: impl AsRef<Path>) -> Result<Self, WorldTypeError> {
    let dir = dir.as_ref();
    let text = std::fs::read_to_string(dir.join(WORLD_DESCRIPTOR))?;
    Self::from_toml_str(&text, dir)
  }

  /// Parses a descriptor for a world stored in `dir`.
  pub fn from_toml_str(text: &str, dir: impl Into<PathBuf>) -> Result<Self, WorldTypeError> {
    let file: WorldTypeFile = toml::from_str(text)?;
    Ok(Self {
      display_name: file.display_name.unwrap_or_else(|| file.name.clone()),
      name: file.name,
      directory: dir.into(),
      dimensions: WorldDims::new(file.width, file.height),
      levels: ElevationLevels::new(file.sea_level, file.shallows_level, file.sand_level),
      spawn_position: file.spawn_position,
    })
  }

  /// Chunk containing the spawn tile.
  pub fn spawn_chunk(&self, chunk_size: u32) -> ChunkPos {
    self.spawn_position.chunk(chunk_size)
  }
}

/// Error type for world descriptor loading.
#[derive(Debug)]
pub enum WorldTypeError {
  /// Reading `world.toml` failed.
  Io(io::Error),
  /// `world.toml` was malformed.
  Parse(toml::de::Error),
}

impl fmt::Display for WorldTypeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(e) => write!(f, "I/O error: {e}"),
      Self::Parse(e) => write!(f, "invalid world descriptor: {e}"),
    }
  }
}

impl Error for WorldTypeError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Io(e) => Some(e),
      Self::Parse(e) => Some(e),
    }
  }
}

impl From<io::Error> for WorldTypeError {
  fn from(err: io::Error) -> Self {
    Self::Io(err)
  }
}

impl From<toml::de::Error> for WorldTypeError {
  fn from(err: toml::de::Error) -> Self {
    Self::Parse(err)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const DESCRIPTOR: &str = r#"
name = "archipelago"
width = 10
height = 8
sea_level = 5
shallows_level = 10
sand_level = 15
spawn_position = { x = 70, y = -3 }
"#;

  #[test]
  fn parses_descriptor() {
    let world = WorldType::from_toml_str(DESCRIPTOR, "worlds/archipelago").unwrap();
    assert_eq!(world.name, "archipelago");
    assert_eq!(world.display_name, "archipelago");
    assert_eq!(world.directory, PathBuf::from("worlds/archipelago"));
    assert_eq!(world.dimensions, WorldDims::new(10, 8));
    assert_eq!(world.levels, ElevationLevels::new(5, 10, 15));
    assert_eq!(world.spawn_chunk(16), ChunkPos::new(4, -1));
  }

  #[test]
  fn load_reports_missing_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(WorldType::load(dir.path()), Err(WorldTypeError::Io(_))));

    std::fs::write(dir.path().join(WORLD_DESCRIPTOR), "name = 3").unwrap();
    assert!(matches!(WorldType::load(dir.path()), Err(WorldTypeError::Parse(_))));
  }
}
