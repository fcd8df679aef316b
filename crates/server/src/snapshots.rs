//! On-disk copies of captured floors, for crash recovery.
//!
//! While a round runs, the floor's pre-game terrain lives only in memory. To
//! survive a crash, the snapshot is also written to
//! `<dir>/<arena id>.snapshot.json.gz` (gzip-compressed JSON) when the round
//! starts and deleted once the floor has been restored. A file still present
//! at startup means the last round never finished: the registry restores it.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use spleef_engine::region::{CuboidRegion, Snapshot};
use spleef_engine::store::WorldId;
use spleef_engine::world::position::BlockPos;

/// A captured floor plus the coordinates it belongs to.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedFloor {
    pub world: WorldId,
    pub min: BlockPos,
    pub max: BlockPos,
    pub snapshot: Snapshot,
}

impl SavedFloor {
    /// Whether this saved copy was taken from exactly `region`'s volume.
    pub fn matches(&self, region: &CuboidRegion) -> bool {
        self.world == *region.world() && self.min == region.min() && self.max == region.max()
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, arena_id: &str) -> PathBuf {
        self.dir.join(format!("{}.snapshot.json.gz", arena_id))
    }

    /// Write the region's current snapshot. Written to a temp file first and
    /// renamed, so a crash mid-write never leaves a truncated file behind.
    pub fn save(&self, arena_id: &str, region: &CuboidRegion) -> Result<()> {
        let Some(snapshot) = region.snapshot() else {
            bail!("arena '{}' has no captured floor to save", arena_id);
        };
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating snapshot dir {}", self.dir.display()))?;

        let saved = SavedFloor {
            world: region.world().clone(),
            min: region.min(),
            max: region.max(),
            snapshot: snapshot.clone(),
        };

        let path = self.path(arena_id);
        let tmp = path.with_extension("tmp");
        let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, &saved)
            .with_context(|| format!("serializing floor of arena '{}'", arena_id))?;
        encoder
            .finish()
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("moving snapshot to {}", path.display()))?;

        tracing::debug!("Saved floor snapshot of '{}' to {}", arena_id, path.display());
        Ok(())
    }

    /// Read a saved floor, if one exists.
    pub fn load(&self, arena_id: &str) -> Result<Option<SavedFloor>> {
        let path = self.path(arena_id);
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let saved = serde_json::from_reader(GzDecoder::new(BufReader::new(file)))
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(saved))
    }

    /// Delete a saved floor. Missing files are fine.
    pub fn remove(&self, arena_id: &str) -> Result<()> {
        let path = self.path(arena_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}
