//! The block store: every loaded world, addressed by world identifier.
//!
//! Game layers only see the [`BlockStore`] trait, so tests and the server can
//! swap in whatever backing they need. [`Universe`] is the in-memory store
//! built on the chunked [`World`].

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::world::World;
use crate::world::block::Cell;
use crate::world::position::BlockPos;

/// Name of a world ("world", "world_nether", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(pub String);

impl WorldId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorldId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for WorldId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-voxel read/write access. Writes are visible to every reader
/// immediately; nothing is transactional.
///
/// Both calls fail only when the world itself is unreachable (not loaded).
pub trait BlockStore: Send + Sync {
    fn read_cell(&self, world: &WorldId, pos: BlockPos) -> Result<Cell>;

    fn write_cell(&self, world: &WorldId, pos: BlockPos, cell: Cell) -> Result<()>;

    /// Whether `world` is currently loaded.
    fn has_world(&self, world: &WorldId) -> bool;
}

/// All loaded worlds.
pub struct Universe {
    worlds: DashMap<WorldId, Arc<World>>,
}

impl Universe {
    pub fn new() -> Self {
        Self {
            worlds: DashMap::new(),
        }
    }

    /// Load (or replace) a world under `id`.
    pub fn insert_world(&self, id: impl Into<WorldId>, world: World) -> Arc<World> {
        let world = Arc::new(world);
        self.worlds.insert(id.into(), Arc::clone(&world));
        world
    }

    pub fn unload_world(&self, id: &WorldId) -> Option<Arc<World>> {
        self.worlds.remove(id).map(|(_, world)| world)
    }

    pub fn world(&self, id: &WorldId) -> Option<Arc<World>> {
        self.worlds.get(id).map(|w| Arc::clone(&*w))
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for Universe {
    fn read_cell(&self, world: &WorldId, pos: BlockPos) -> Result<Cell> {
        match self.worlds.get(world) {
            Some(w) => Ok(w.get_cell(pos)),
            None => bail!("world '{}' is not loaded", world),
        }
    }

    fn write_cell(&self, world: &WorldId, pos: BlockPos, cell: Cell) -> Result<()> {
        match self.worlds.get(world) {
            Some(w) => {
                w.set_cell(pos, cell);
                Ok(())
            }
            None => bail!("world '{}' is not loaded", world),
        }
    }

    fn has_world(&self, world: &WorldId) -> bool {
        self.worlds.contains_key(world)
    }
}
