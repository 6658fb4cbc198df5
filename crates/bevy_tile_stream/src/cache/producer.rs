//! The background chunk producer.
//!
//! A run walks the order's neighborhood ring by ring outward from the
//! center, loading every in-world chunk that was not already resident when
//! the order was placed. Loads happen outside the coordinator lock; each
//! loaded chunk is then staged, which is also where cancellation is
//! observed.

use std::sync::Arc;

// WASM compat: std::time::Instant panics on wasm32
use web_time::Instant;

use super::coordinator::{CacheCoordinator, StageOutcome};
use super::{CacheOrder, CancelToken};
use crate::coords::{ChunkPos, WorldDims};
use crate::loading::ChunkSource;

/// Summary of one producer run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
  /// Chunks loaded from the source.
  pub loaded: usize,
  /// Chunks that reached the staging buffer.
  pub staged: usize,
  /// Whether the run stopped early.
  pub cancelled: bool,
}

/// Every in-world position within `range` chunks of `center`, ordered by
/// ring distance. Positions within a ring are row-major.
pub fn candidate_positions(center: ChunkPos, range: u32, dims: WorldDims) -> Vec<ChunkPos> {
  let range = range as i32;
  let side = (2 * range + 1) as usize;
  let mut positions = Vec::with_capacity(side * side);
  for ring in 0..=range {
    for dy in -ring..=ring {
      for dx in -ring..=ring {
        if dx.abs() != ring && dy.abs() != ring {
          continue;
        }
        let pos = ChunkPos::new(center.x + dx, center.y + dy);
        if dims.contains(pos) {
          positions.push(pos);
        }
      }
    }
  }
  positions
}

/// Ends the run on the coordinator when dropped, unless it finished.
///
/// Covers cancellation returns and panics inside the loader alike, so the
/// main thread is never left waiting on `production_may_start`.
struct ProductionGuard<'a> {
  coordinator: &'a CacheCoordinator,
  finished: bool,
}

impl Drop for ProductionGuard<'_> {
  fn drop(&mut self) {
    if !self.finished {
      self.coordinator.abandon_production();
    }
  }
}

/// Executes one order. Runs on the producer thread.
pub fn run(
  coordinator: &CacheCoordinator,
  source: &ChunkSource,
  order: CacheOrder,
  token: CancelToken,
) -> RunReport {
  let started = Instant::now();
  let mut guard = ProductionGuard {
    coordinator,
    finished: false,
  };
  let mut report = RunReport::default();

  let candidates = candidate_positions(order.center, coordinator.range(), order.world_dimensions);
  for pos in candidates {
    if order.known_resident.contains(&pos) {
      continue;
    }

    let chunk = source.load_in(&order.world_directory, pos);
    report.loaded += 1;

    match coordinator.stage(chunk, &token) {
      StageOutcome::Staged => report.staged += 1,
      StageOutcome::Cancelled { staged } => {
        if staged {
          report.staged += 1;
        }
        report.cancelled = true;
        coordinator.trace(format_args!(
          "run for {:?} cancelled after {} loads",
          order.center, report.loaded
        ));
        return report;
      }
    }
  }

  guard.finished = true;
  coordinator.finish_production();
  coordinator.trace(format_args!(
    "run for {:?} staged {} chunks in {:.1?}",
    order.center,
    report.staged,
    started.elapsed()
  ));
  report
}

/// Spawns [`run`] on a named thread.
pub(crate) fn spawn(
  coordinator: Arc<CacheCoordinator>,
  source: Arc<ChunkSource>,
  order: CacheOrder,
  token: CancelToken,
) -> std::io::Result<std::thread::JoinHandle<RunReport>> {
  std::thread::Builder::new()
    .name("chunk-cache-producer".into())
    .spawn(move || run(&coordinator, &source, order, token))
}
