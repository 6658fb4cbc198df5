//! Background chunk cache.
//!
//! The window tracker places a [`CacheOrder`] whenever the window moves.
//! Once per tick [`ChunkCache::manage`] drains chunks the producer staged
//! into the pool, then starts the latest pending order on a producer
//! thread. Only the most recent order matters: placing an order discards
//! any order still pending and cancels the run in flight.
//!
//! ```text
//!   main thread                         producer thread
//!   -----------                         ---------------
//!   place_order ---> [pending]
//!   manage:
//!     take_staged <--- [staging] <----- stage(chunk)  (waits while full)
//!     begin_production ---------------> run(order)
//!                        [in progress] <- finish / abandon
//! ```

mod coordinator;
pub mod producer;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use bevy::log::{error, warn};
pub use coordinator::{CacheCoordinator, StageOutcome};
pub use producer::RunReport;

use crate::coords::{ChunkPos, WorldDims};
use crate::loading::ChunkSource;
use crate::pool::ChunkPool;

/// Snapshot describing the neighborhood to prefetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheOrder {
  pub world_directory: PathBuf,
  pub world_dimensions: WorldDims,
  /// Chunks resident in the pool when the order was placed.
  pub known_resident: HashSet<ChunkPos>,
  pub center: ChunkPos,
}

/// Cancellation flag for one producer run.
///
/// Set by the coordinator when a newer order arrives or the cache shuts
/// down. The producer reads it under the coordinator lock.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }
}

/// Main-thread side of the cache: owns the producer thread handle.
pub struct ChunkCache {
  coordinator: Arc<CacheCoordinator>,
  source: Arc<ChunkSource>,
  worker: Option<JoinHandle<RunReport>>,
}

impl ChunkCache {
  pub fn new(coordinator: Arc<CacheCoordinator>, source: Arc<ChunkSource>) -> Self {
    Self {
      coordinator,
      source,
      worker: None,
    }
  }

  pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
    &self.coordinator
  }

  /// Runs one manage step.
  ///
  /// Drains staged chunks into `pool` (dropping positions already
  /// resident), trims the pool to `cap` without touching `referenced`, then
  /// starts the pending order if there is one. Returns the number of chunks
  /// added to the pool.
  pub fn manage(&mut self, pool: &mut ChunkPool, referenced: &HashSet<ChunkPos>, cap: usize) -> usize {
    let mut consumed = 0;
    for chunk in self.coordinator.take_staged() {
      if pool.insert_loaded(chunk) {
        consumed += 1;
      }
    }
    if consumed > 0 {
      pool.drop_unreferenced(referenced, cap);
    }

    self.start_pending();
    consumed
  }

  /// Stops the coordinator and joins the producer thread.
  pub fn shutdown(&mut self) {
    self.coordinator.shutdown();
    self.join_worker();
  }

  fn start_pending(&mut self) {
    let Some((order, token)) = self.coordinator.begin_production() else {
      return;
    };
    // The previous run has released the in-progress flag, so its thread is
    // exiting.
    self.join_worker();

    let coordinator = Arc::clone(&self.coordinator);
    let source = Arc::clone(&self.source);
    match producer::spawn(coordinator, source, order, token) {
      Ok(handle) => self.worker = Some(handle),
      Err(e) => {
        error!("Failed to spawn chunk cache producer, dropping order: {e}");
        self.coordinator.abandon_production();
      }
    }
  }

  fn join_worker(&mut self) {
    let Some(handle) = self.worker.take() else {
      return;
    };
    match handle.join() {
      Ok(report) => self.coordinator.trace(format_args!(
        "joined producer: {} loaded, {} staged, cancelled: {}",
        report.loaded, report.staged, report.cancelled
      )),
      Err(_) => warn!("Chunk cache producer panicked"),
    }
  }
}

impl Drop for ChunkCache {
  fn drop(&mut self) {
    self.shutdown();
  }
}
