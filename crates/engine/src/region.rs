//! Axis-aligned cuboid regions with terrain snapshot/restore.
//!
//! A region knows nothing about game rules. It can tell whether a point lies
//! inside it, copy its whole volume out of the block store, write that copy
//! back, and enumerate the cells an outside predicate approves of.
//!
//! Regions do no locking of their own: callers serialize access (the game tick).

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::store::{BlockStore, WorldId};
use crate::world::block::Cell;
use crate::world::position::{BlockPos, Location};

/// A dense copy of a region's cells, indexed by offset from the minimum corner.
///
/// Offset `(0, 0, 0)` is the minimum corner; the flat index is
/// `(dx * size_y + dy) * size_z + dz`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    size: [u64; 3],
    cells: Vec<Cell>,
}

impl Snapshot {
    pub fn size(&self) -> [u64; 3] {
        self.size
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The captured cell at an offset from the minimum corner.
    pub fn get(&self, dx: u64, dy: u64, dz: u64) -> Option<Cell> {
        let [sx, sy, sz] = self.size;
        if dx >= sx || dy >= sy || dz >= sz {
            return None;
        }
        self.cells.get(((dx * sy + dy) * sz + dz) as usize).copied()
    }

    fn is_consistent(&self) -> bool {
        let [sx, sy, sz] = self.size;
        (sx * sy * sz) as usize == self.cells.len()
    }
}

/// An inclusive box of cells in one world.
pub struct CuboidRegion {
    store: Arc<dyn BlockStore>,
    world: WorldId,
    min: BlockPos,
    max: BlockPos,
    snapshot: Option<Snapshot>,
}

impl CuboidRegion {
    /// Build a region from any two opposite corners; they are sorted per axis.
    pub fn new(store: Arc<dyn BlockStore>, world: impl Into<WorldId>, a: BlockPos, b: BlockPos) -> Self {
        Self {
            store,
            world: world.into(),
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
            snapshot: None,
        }
    }

    pub fn world(&self) -> &WorldId {
        &self.world
    }

    pub fn min(&self) -> BlockPos {
        self.min
    }

    pub fn max(&self) -> BlockPos {
        self.max
    }

    /// Extent along x, y and z, in cells.
    pub fn size(&self) -> [u64; 3] {
        [
            (self.max.x - self.min.x + 1) as u64,
            (self.max.y - self.min.y + 1) as u64,
            (self.max.z - self.min.z + 1) as u64,
        ]
    }

    /// Number of cells in the volume.
    pub fn volume(&self) -> u64 {
        let [sx, sy, sz] = self.size();
        sx * sy * sz
    }

    /// Whether the cell `pos` of `world` lies inside the region (bounds inclusive).
    pub fn contains_block(&self, world: &WorldId, pos: BlockPos) -> bool {
        *world == self.world
            && (self.min.x..=self.max.x).contains(&pos.x)
            && (self.min.y..=self.max.y).contains(&pos.y)
            && (self.min.z..=self.max.z).contains(&pos.z)
    }

    /// Fractional variant of [`contains_block`](Self::contains_block): the
    /// coordinates are floored to their containing cell first.
    pub fn contains(&self, world: &WorldId, x: f64, y: f64, z: f64) -> bool {
        self.contains_block(world, BlockPos::containing(x, y, z))
    }

    pub fn contains_location(&self, location: &Location) -> bool {
        self.contains(&location.world, location.x, location.y, location.z)
    }

    /// Whether the two regions share at least one cell.
    pub fn intersects(&self, other: &CuboidRegion) -> bool {
        self.world == other.world
            && self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// Every cell position in offset order: x outermost, z innermost.
    pub fn positions(&self) -> impl Iterator<Item = BlockPos> + '_ {
        (self.min.x..=self.max.x).flat_map(move |x| {
            (self.min.y..=self.max.y)
                .flat_map(move |y| (self.min.z..=self.max.z).map(move |z| BlockPos::new(x, y, z)))
        })
    }

    /// Copy every cell of the volume into the snapshot, replacing any previous one.
    ///
    /// Fails only when the world is unreachable; the previous snapshot (if any)
    /// is then left untouched.
    pub fn capture(&mut self) -> Result<()> {
        if !self.store.has_world(&self.world) {
            bail!("cannot capture region: world '{}' is not loaded", self.world);
        }

        let mut cells = Vec::with_capacity(self.volume() as usize);
        for pos in self.positions() {
            cells.push(self.store.read_cell(&self.world, pos)?);
        }

        tracing::debug!(
            "Captured {} cells of {} between {:?} and {:?}",
            cells.len(),
            self.world,
            self.min,
            self.max
        );
        self.snapshot = Some(Snapshot {
            size: self.size(),
            cells,
        });
        Ok(())
    }

    /// Write the snapshot back into the world and clear it. Returns the number
    /// of cells written; 0 when nothing was captured.
    ///
    /// If the world is unreachable the snapshot is kept so a later call can
    /// still restore the full volume.
    pub fn restore(&mut self) -> Result<usize> {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return Ok(0);
        };
        if !self.store.has_world(&self.world) {
            bail!("cannot restore region: world '{}' is not loaded", self.world);
        }

        for (pos, cell) in self.positions().zip(snapshot.cells.iter()) {
            self.store.write_cell(&self.world, pos, *cell)?;
        }

        let written = snapshot.cells.len();
        self.snapshot = None;
        tracing::debug!("Restored {} cells of {}", written, self.world);
        Ok(written)
    }

    /// All positions in the volume whose current cell satisfies `legal`.
    pub fn diggable_blocks<F>(&self, mut legal: F) -> Result<Vec<BlockPos>>
    where
        F: FnMut(BlockPos, Cell) -> bool,
    {
        let mut diggable = Vec::new();
        for pos in self.positions() {
            let cell = self.store.read_cell(&self.world, pos)?;
            if legal(pos, cell) {
                diggable.push(pos);
            }
        }
        Ok(diggable)
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Install a snapshot taken elsewhere (e.g. reloaded from disk). It must
    /// match this region's dimensions exactly.
    pub fn adopt_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        if snapshot.size != self.size() || !snapshot.is_consistent() {
            bail!(
                "snapshot of size {:?} does not fit region of size {:?}",
                snapshot.size,
                self.size()
            );
        }
        self.snapshot = Some(snapshot);
        Ok(())
    }
}

impl fmt::Debug for CuboidRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CuboidRegion")
            .field("world", &self.world)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("captured", &self.snapshot.is_some())
            .finish()
    }
}
