use serde::{Deserialize, Serialize};

use super::position::ChunkPos;

/// Persisted layout of one section.
///
/// Cells are ordered `(y << 8) | (z << 4) | x`. A dense id splits into
/// `add` (block bits 8..12), `blocks` (block bits 0..8) and `data` (metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionData {
    /// Vertical band, 0..16.
    pub y: u8,
    pub blocks: Vec<u8>,
    /// Only present when some block id needs more than 8 bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<u8>>,
    pub data: Vec<u8>,
    pub block_light: Vec<u8>,
    pub sky_light: Vec<u8>,
}

/// Detached copy of a chunk handed to the persistence layer.
///
/// Holds only non-empty sections; a missing band loads as air.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    pub x: i32,
    pub z: i32,
    pub sections: Vec<SectionData>,
    /// 256 entries, `z << 4 | x`.
    pub height_map: Vec<i32>,
}

impl ChunkSnapshot {
    pub fn pos(&self) -> ChunkPos {
        ChunkPos::new(self.x, self.z)
    }
}
