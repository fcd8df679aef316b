pub mod block;
pub mod chunk;
pub mod position;

use block::Cell;
use chunk::Chunk;
use dashmap::DashMap;
use position::{BlockPos, ChunkPos};

/// One block world. Thread-safe, lock-sharded by chunk.
///
/// Unloaded chunks read as empty; writing into one creates it.
pub struct World {
    chunks: DashMap<ChunkPos, Chunk>,
}

impl World {
    pub fn new() -> Self {
        Self {
            chunks: DashMap::new(),
        }
    }

    /// Read a cell at an absolute position. Returns `Cell::EMPTY` for unloaded chunks.
    pub fn get_cell(&self, pos: BlockPos) -> Cell {
        match self.chunks.get(&pos.chunk()) {
            Some(chunk) => chunk.get_cell(pos.local()),
            None => Cell::EMPTY,
        }
    }

    /// Write a cell at an absolute position. Creates the chunk if needed.
    ///
    /// Takes `&self` (not `&mut self`) because `DashMap` provides interior
    /// mutability via per-shard locking.
    pub fn set_cell(&self, pos: BlockPos, cell: Cell) {
        self.chunks
            .entry(pos.chunk())
            .or_default()
            .set_cell(pos.local(), cell);
    }

    /// Insert a pre-built chunk (used for generation).
    pub fn insert_chunk(&self, pos: ChunkPos, chunk: Chunk) {
        self.chunks.insert(pos, chunk);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
