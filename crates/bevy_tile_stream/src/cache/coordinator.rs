//! Shared hand-off state between the main thread and the producer.
//!
//! One mutex guards the pending order slot, the in-progress flag and the
//! staging buffer. Two condition variables pair with it:
//! - `buffer_has_room`: signalled after every drain, wakes a producer
//!   blocked on a full staging buffer.
//! - `production_may_start`: signalled when a run finishes or is
//!   abandoned, wakes a main thread waiting to start the next order.
//!
//! Lock failures (poisoned mutex) are logged and the step is skipped. The
//! cache is a best-effort prefetch layer, so a skipped step only delays
//! prefetching.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};

use bevy::log::{debug, error};

use super::{CacheOrder, CancelToken};
use crate::primitives::Chunk;

/// Result of handing a freshly loaded chunk to the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOutcome {
  /// The chunk was staged and the run may continue.
  Staged,
  /// A newer order, a reset or a shutdown superseded the run. `staged`
  /// tells whether the chunk still made it into the buffer.
  Cancelled { staged: bool },
}

struct CacheState {
  pending: Option<CacheOrder>,
  production_in_progress: bool,
  staging: Vec<Chunk>,
  /// Token of the run currently in flight.
  running: Option<CancelToken>,
  /// Set by `reset` until the next run begins. The run in flight loaded
  /// from stale data and must not stage anything.
  discard: bool,
  shut_down: bool,
}

/// Lock-protected state shared by the window tracker, the chunk cache and
/// the producer thread.
pub struct CacheCoordinator {
  state: Mutex<CacheState>,
  buffer_has_room: Condvar,
  production_may_start: Condvar,
  staging_capacity: usize,
  range: u32,
  trace: bool,
}

impl CacheCoordinator {
  /// Creates a coordinator with an empty staging buffer.
  ///
  /// `staging_capacity` bounds the buffer, `range` is the producer's search
  /// radius in chunks, `trace` enables a debug line per state transition.
  pub fn new(staging_capacity: usize, range: u32, trace: bool) -> Self {
    Self {
      state: Mutex::new(CacheState {
        pending: None,
        production_in_progress: false,
        staging: Vec::with_capacity(staging_capacity),
        running: None,
        discard: false,
        shut_down: false,
      }),
      buffer_has_room: Condvar::new(),
      production_may_start: Condvar::new(),
      staging_capacity,
      range,
      trace,
    }
  }

  /// Replaces the pending order. Older pending orders are discarded and a
  /// run in flight is told to stop at its next safe point.
  pub fn place_order(&self, order: CacheOrder) {
    let Some(mut state) = self.lock("place order") else {
      return;
    };
    if state.shut_down {
      return;
    }
    self.trace(format_args!(
      "placing cache order centered on {:?} ({} resident)",
      order.center,
      order.known_resident.len()
    ));
    if state.pending.replace(order).is_some() {
      self.trace(format_args!("discarded superseded pending order"));
    }
    if let Some(token) = &state.running {
      token.cancel();
    }
    drop(state);
    // A producer blocked on a full buffer must wake to observe the order.
    self.buffer_has_room.notify_all();
  }

  /// Moves every staged chunk out of the buffer, then wakes the producer.
  pub fn take_staged(&self) -> Vec<Chunk> {
    let Some(mut state) = self.lock("drain staging buffer") else {
      return Vec::new();
    };
    let staged = std::mem::take(&mut state.staging);
    drop(state);
    if !staged.is_empty() {
      self.trace(format_args!("drained {} staged chunks", staged.len()));
    }
    self.buffer_has_room.notify_all();
    staged
  }

  /// Takes the pending order and marks production as in progress.
  ///
  /// Returns `None` when no order is pending. If a previous run is still in
  /// flight, blocks on `production_may_start` until it finishes.
  pub fn begin_production(&self) -> Option<(CacheOrder, CancelToken)> {
    let mut state = self.lock("begin production")?;
    state.pending.as_ref()?;

    while state.production_in_progress && !state.shut_down {
      self.trace(format_args!("waiting for previous production to finish"));
      state = match self.production_may_start.wait(state) {
        Ok(state) => state,
        Err(e) => {
          error!("Chunk cache lock poisoned while waiting to begin production: {e}");
          return None;
        }
      };
    }
    if state.shut_down {
      return None;
    }

    let order = state.pending.take()?;
    let token = CancelToken::new();
    state.discard = false;
    state.production_in_progress = true;
    state.running = Some(token.clone());
    self.trace(format_args!("production started for center {:?}", order.center));
    Some((order, token))
  }

  /// Hands a loaded chunk to the staging buffer.
  ///
  /// Blocks while the buffer is full, unless the run is cancelled. A run
  /// superseded by a newer order still stages its chunk when there is room,
  /// so the load is not wasted, but never waits for room. After a reset or a
  /// shutdown the chunk is always discarded.
  pub fn stage(&self, chunk: Chunk, token: &CancelToken) -> StageOutcome {
    let Some(mut state) = self.lock("stage chunk") else {
      return StageOutcome::Cancelled { staged: false };
    };
    loop {
      let cancelled = token.is_cancelled() || state.pending.is_some();
      if state.shut_down || state.discard {
        self.trace(format_args!("discarding stale chunk {:?}", chunk.pos()));
        return StageOutcome::Cancelled { staged: false };
      }
      if state.staging.len() < self.staging_capacity {
        self.trace(format_args!("staged chunk {:?}", chunk.pos()));
        state.staging.push(chunk);
        return if cancelled {
          self.trace(format_args!("production superseded after staging"));
          StageOutcome::Cancelled { staged: true }
        } else {
          StageOutcome::Staged
        };
      }
      if cancelled {
        self.trace(format_args!(
          "production superseded, discarding chunk {:?}",
          chunk.pos()
        ));
        return StageOutcome::Cancelled { staged: false };
      }

      self.trace(format_args!("staging buffer full, producer waiting"));
      state = match self.buffer_has_room.wait(state) {
        Ok(state) => state,
        Err(e) => {
          error!("Chunk cache lock poisoned while waiting for buffer room: {e}");
          return StageOutcome::Cancelled { staged: false };
        }
      };
    }
  }

  /// Marks the current run as complete.
  pub fn finish_production(&self) {
    self.end_production("production finished");
  }

  /// Marks the current run as stopped early.
  pub fn abandon_production(&self) {
    self.end_production("production abandoned");
  }

  /// Drops the pending order and staged chunks and cancels the run in
  /// flight. Chunks that run loads afterwards are discarded. The
  /// in-progress flag clears when that run abandons.
  pub fn reset(&self) {
    let Some(mut state) = self.lock("reset") else {
      return;
    };
    state.pending = None;
    state.staging.clear();
    if let Some(token) = &state.running {
      token.cancel();
      state.discard = true;
    }
    drop(state);
    self.trace(format_args!("cache reset"));
    self.buffer_has_room.notify_all();
  }

  /// Permanently stops the coordinator and wakes every waiter.
  pub fn shutdown(&self) {
    if let Some(mut state) = self.lock("shutdown") {
      state.shut_down = true;
      state.pending = None;
      state.staging.clear();
      if let Some(token) = &state.running {
        token.cancel();
      }
    }
    self.trace(format_args!("cache shut down"));
    self.buffer_has_room.notify_all();
    self.production_may_start.notify_all();
  }

  /// Number of chunks waiting in the staging buffer.
  pub fn staged_len(&self) -> usize {
    self.lock("read staging length").map_or(0, |s| s.staging.len())
  }

  /// Returns true while a run is in flight.
  pub fn is_producing(&self) -> bool {
    self
      .lock("read production flag")
      .is_some_and(|s| s.production_in_progress)
  }

  /// Returns true if an order is waiting to be started.
  pub fn has_pending_order(&self) -> bool {
    self
      .lock("read pending order")
      .is_some_and(|s| s.pending.is_some())
  }

  pub fn staging_capacity(&self) -> usize {
    self.staging_capacity
  }

  /// Producer search radius in chunks.
  pub fn range(&self) -> u32 {
    self.range
  }

  pub(crate) fn trace(&self, args: fmt::Arguments<'_>) {
    if self.trace {
      debug!("chunk cache: {args}");
    }
  }

  fn end_production(&self, what: &str) {
    if let Some(mut state) = self.lock(what) {
      state.production_in_progress = false;
      state.running = None;
    }
    self.trace(format_args!("{what}"));
    self.production_may_start.notify_all();
  }

  fn lock(&self, what: &str) -> Option<MutexGuard<'_, CacheState>> {
    match self.state.lock() {
      Ok(state) => Some(state),
      Err(e) => {
        error!("Chunk cache lock poisoned, skipping {what}: {e}");
        None
      }
    }
  }
}
