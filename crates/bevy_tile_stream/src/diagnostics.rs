//! Streaming statistics for dev overlays and logs.

use std::fmt;

use crate::coords::ChunkPos;

/// Pool positions per line in the [`Display`](fmt::Display) output.
const POSITIONS_PER_LINE: usize = 8;

/// Snapshot of the streaming layer's state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
  pub center: ChunkPos,
  pub origin: ChunkPos,
  pub pool_len: usize,
  pub pool_capacity: usize,
  /// Resident positions, least recently used first.
  pub pool_positions: Vec<ChunkPos>,
  pub staged: usize,
  pub producing: bool,
  pub pending_order: bool,
}

impl fmt::Display for StreamingStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Center chunk: {},{}", self.center.x, self.center.y)?;
    writeln!(f, "Window origin: {},{}", self.origin.x, self.origin.y)?;
    writeln!(
      f,
      "Staged: {} | Producing: {} | Pending order: {}",
      self.staged, self.producing, self.pending_order
    )?;
    write!(f, "Chunk pool ({}/{}):", self.pool_len, self.pool_capacity)?;
    for line in self.pool_positions.chunks(POSITIONS_PER_LINE) {
      writeln!(f)?;
      let mut sep = "";
      for pos in line {
        write!(f, "{sep}{},{}", pos.x, pos.y)?;
        sep = " ";
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pool_is_listed_eight_per_line() {
    let stats = StreamingStats {
      pool_len: 10,
      pool_capacity: 12,
      pool_positions: (0..10).map(|x| ChunkPos::new(x, 1)).collect(),
      ..Default::default()
    };
    let text = stats.to_string();
    let lines: Vec<_> = text.lines().collect();

    assert_eq!(lines[3], "Chunk pool (10/12):");
    assert_eq!(lines[4], "0,1 1,1 2,1 3,1 4,1 5,1 6,1 7,1");
    assert_eq!(lines[5], "8,1 9,1");
    assert_eq!(lines.len(), 6);
  }
}
