use serde::{Deserialize, Serialize};

/// Opaque material identifier. The engine stores these without interpreting them.
/// Game-specific layers assign meaning to specific IDs (e.g. 0 = air, 80 = snow).
///
/// The only semantic the engine enforces is that `BlockId::AIR` (0) is the
/// "empty" material: chunk sections filled entirely with empty cells are deallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The universal "empty" block.
    pub const AIR: BlockId = BlockId(0);

    pub const fn new(id: u16) -> Self {
        Self(id)
    }
}

/// One voxel: a material plus its auxiliary data byte (wool colour, slab
/// half, growth stage...). Two cells are equal only if both parts match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    pub material: BlockId,
    pub data: u8,
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        material: BlockId::AIR,
        data: 0,
    };

    pub const fn new(material: u16, data: u8) -> Self {
        Self {
            material: BlockId(material),
            data,
        }
    }

    pub const fn of(material: BlockId) -> Self {
        Self { material, data: 0 }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}
