//! Known-empty chunk coordinates.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use bevy::log::warn;

use crate::coords::ChunkPos;

/// File name of the empty chunk list inside a world directory.
pub const EMPTY_CHUNK_LIST: &str = "emptyChunkCoords";

/// Chunk positions with no backing data.
///
/// Loaded once per world. Positions in the set are synthesized as blank
/// chunks instead of being loaded.
#[derive(Clone, Debug, Default)]
pub struct EmptyChunkSet {
  positions: HashSet<ChunkPos>,
}

impl EmptyChunkSet {
  pub fn from_positions(positions: impl IntoIterator<Item = ChunkPos>) -> Self {
    Self {
      positions: positions.into_iter().collect(),
    }
  }

  /// Reads `<dir>/emptyChunkCoords`.
  ///
  /// A missing file is an empty set. Other read errors are logged and also
  /// produce an empty set, so every chunk is attempted normally.
  pub fn load(dir: &Path) -> Self {
    let path = dir.join(EMPTY_CHUNK_LIST);
    match std::fs::read_to_string(&path) {
      Ok(text) => Self::parse(&text),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
      Err(e) => {
        warn!("Failed to read {}: {e}", path.display());
        Self::default()
      }
    }
  }

  /// Parses one `x,y` pair per line. Malformed lines are skipped.
  pub fn parse(text: &str) -> Self {
    let mut positions = HashSet::new();
    for (number, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      match parse_coords(line) {
        Some(pos) => {
          positions.insert(pos);
        }
        None => warn!("Skipping malformed empty chunk entry on line {}: {line:?}", number + 1),
      }
    }
    Self { positions }
  }

  #[inline]
  pub fn contains(&self, pos: ChunkPos) -> bool {
    self.positions.contains(&pos)
  }

  pub fn len(&self) -> usize {
    self.positions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.positions.is_empty()
  }
}

fn parse_coords(line: &str) -> Option<ChunkPos> {
  let (x, y) = line.split_once(',')?;
  Some(ChunkPos::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}
