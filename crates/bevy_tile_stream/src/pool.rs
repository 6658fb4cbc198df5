//! Chunk pool - the bounded set of loaded chunks.
//!
//! Chunks live in slots addressed by generation-stamped [`ChunkHandle`]s.
//! Evicting a chunk bumps its slot's generation, so stale handles resolve
//! to `None` instead of silently pointing at whatever reused the slot, and
//! no other handle changes when an entry is removed.
//!
//! Recency is tracked separately: the front of the order is the least
//! recently used chunk, the back the most recently touched or inserted.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::coords::ChunkPos;
use crate::loading::ChunkSource;
use crate::primitives::Chunk;

/// Index into the pool's slot storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SlotIndex(usize);

/// Stable reference to a pooled chunk.
///
/// Valid until the chunk is evicted or the pool is cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
  slot: SlotIndex,
  generation: u32,
}

struct ChunkSlot {
  chunk: Option<Chunk>,
  generation: u32,
}

/// Bounded, recency-ordered chunk storage.
pub struct ChunkPool {
  slots: Vec<ChunkSlot>,
  free: Vec<SlotIndex>,
  /// Maps resident chunk positions to their slots.
  lookup: HashMap<ChunkPos, SlotIndex>,
  /// Resident positions, least recently used first.
  recency: VecDeque<ChunkPos>,
  capacity: usize,
}

impl ChunkPool {
  /// Creates an empty pool that eviction trims toward `capacity`.
  pub fn new(capacity: usize) -> Self {
    Self {
      slots: Vec::with_capacity(capacity),
      free: Vec::new(),
      lookup: HashMap::with_capacity(capacity),
      recency: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Returns a handle for `pos`, loading the chunk synchronously on a miss.
  ///
  /// A hit moves the chunk to the most recently used end.
  pub fn touch_or_insert(&mut self, pos: ChunkPos, source: &ChunkSource) -> ChunkHandle {
    if let Some(handle) = self.touch(pos) {
      return handle;
    }
    self.insert(source.load(pos))
  }

  /// Moves a resident chunk to the most recently used end.
  pub fn touch(&mut self, pos: ChunkPos) -> Option<ChunkHandle> {
    let slot = *self.lookup.get(&pos)?;
    if let Some(i) = self.recency.iter().position(|&p| p == pos) {
      self.recency.remove(i);
    }
    self.recency.push_back(pos);
    Some(self.handle(slot))
  }

  /// Adds a chunk produced elsewhere.
  ///
  /// Returns false and drops the chunk if its position is already resident.
  pub fn insert_loaded(&mut self, chunk: Chunk) -> bool {
    if self.lookup.contains_key(&chunk.pos()) {
      return false;
    }
    self.insert(chunk);
    true
  }

  /// Evicts unreferenced chunks, least recently used first, until at most
  /// `cap` remain.
  ///
  /// Stops early when every remaining chunk is referenced. Returns the
  /// evicted positions in eviction order.
  pub fn drop_unreferenced(&mut self, referenced: &HashSet<ChunkPos>, cap: usize) -> Vec<ChunkPos> {
    let mut evicted = Vec::new();
    let mut i = 0;
    while self.recency.len() > cap && i < self.recency.len() {
      let pos = self.recency[i];
      if referenced.contains(&pos) {
        i += 1;
        continue;
      }
      self.recency.remove(i);
      self.release(pos);
      evicted.push(pos);
    }
    evicted
  }

  /// Resolves a handle, or `None` if its chunk was evicted.
  #[inline]
  pub fn get(&self, handle: ChunkHandle) -> Option<&Chunk> {
    let slot = self.slots.get(handle.slot.0)?;
    if slot.generation != handle.generation {
      return None;
    }
    slot.chunk.as_ref()
  }

  /// Returns the handle of a resident chunk without touching it.
  pub fn handle_for(&self, pos: ChunkPos) -> Option<ChunkHandle> {
    self.lookup.get(&pos).map(|&slot| self.handle(slot))
  }

  /// Resident positions, least recently used first.
  pub fn positions(&self) -> impl ExactSizeIterator<Item = ChunkPos> + '_ {
    self.recency.iter().copied()
  }

  pub fn contains(&self, pos: ChunkPos) -> bool {
    self.lookup.contains_key(&pos)
  }

  pub fn len(&self) -> usize {
    self.recency.len()
  }

  pub fn is_empty(&self) -> bool {
    self.recency.is_empty()
  }

  /// Size eviction trims toward.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Drops every chunk and invalidates all handles.
  pub fn clear(&mut self) {
    let positions: Vec<_> = self.recency.drain(..).collect();
    for pos in positions {
      self.release(pos);
    }
  }

  fn insert(&mut self, chunk: Chunk) -> ChunkHandle {
    let pos = chunk.pos();
    let slot = match self.free.pop() {
      Some(slot) => {
        self.slots[slot.0].chunk = Some(chunk);
        slot
      }
      None => {
        self.slots.push(ChunkSlot {
          chunk: Some(chunk),
          generation: 0,
        });
        SlotIndex(self.slots.len() - 1)
      }
    };
    self.lookup.insert(pos, slot);
    self.recency.push_back(pos);
    self.handle(slot)
  }

  /// Frees the slot for `pos`. The caller removes it from `recency`.
  fn release(&mut self, pos: ChunkPos) {
    if let Some(slot) = self.lookup.remove(&pos) {
      let entry = &mut self.slots[slot.0];
      entry.chunk = None;
      entry.generation = entry.generation.wrapping_add(1);
      self.free.push(slot);
    }
  }

  fn handle(&self, slot: SlotIndex) -> ChunkHandle {
    ChunkHandle {
      slot,
      generation: self.slots[slot.0].generation,
    }
  }
}
