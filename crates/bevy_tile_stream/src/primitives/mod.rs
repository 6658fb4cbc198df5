//! Core data primitives.

mod chunk;

pub use chunk::Chunk;
