//! Material ids used by the spleef layer.
//!
//! These are the classic numeric block ids; the data byte of a [`Cell`]
//! carries the variant (wool colour and the like).

use spleef_engine::world::block::{BlockId, Cell};

pub const AIR: BlockId = BlockId(0);
pub const STONE: BlockId = BlockId(1);
pub const GRASS: BlockId = BlockId(2);
pub const DIRT: BlockId = BlockId(3);
pub const BEDROCK: BlockId = BlockId(7);
pub const SAND: BlockId = BlockId(12);
pub const GRAVEL: BlockId = BlockId(13);
pub const WOOL: BlockId = BlockId(35);
pub const SNOW_BLOCK: BlockId = BlockId(80);

/// Wool of the given colour (data byte 0..=15).
pub const fn wool(colour: u8) -> Cell {
    Cell {
        material: WOOL,
        data: colour,
    }
}

/// Human-readable material name for logs and chat.
pub fn name(id: BlockId) -> &'static str {
    match id {
        AIR => "air",
        STONE => "stone",
        GRASS => "grass",
        DIRT => "dirt",
        BEDROCK => "bedrock",
        SAND => "sand",
        GRAVEL => "gravel",
        WOOL => "wool",
        SNOW_BLOCK => "snow block",
        _ => "block",
    }
}
