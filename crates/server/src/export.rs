//! JSON dump of a chunk's occupied cells, for inspection and diffing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use blockstore_engine::world::Chunk;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BlockEntry {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub block: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// `(block << 4) | metadata`.
    pub dense_id: u16,
}

#[derive(Debug, Serialize)]
pub struct ChunkExport {
    pub x: i32,
    pub z: i32,
    pub height_map: Vec<i32>,
    pub tile_entities: usize,
    pub blocks: Vec<BlockEntry>,
}

impl ChunkExport {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let registry = chunk.registry();
        let blocks = chunk
            .occupied_states()
            .map(|(pos, state)| {
                let view = registry.state(state);
                BlockEntry {
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                    block: view.block_name().to_owned(),
                    properties: view
                        .properties()
                        .map(|(name, value)| (name.to_owned(), value.into_owned()))
                        .collect(),
                    dense_id: view.dense_id().0,
                }
            })
            .collect();

        Self {
            x: chunk.pos().x,
            z: chunk.pos().z,
            height_map: chunk.height_map().to_vec(),
            tile_entities: chunk.tile_count(),
            blocks,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing chunk export")?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), blocks = self.blocks.len(), "chunk exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::blocks::BlockSet;
    use blockstore_engine::state::Facing;
    use blockstore_engine::world::{BlockPos, ChunkPos};

    #[test]
    fn export_lists_occupied_cells_with_properties() {
        let blocks = BlockSet::register().unwrap();
        let mut chunk = Chunk::empty(Arc::clone(&blocks.registry), ChunkPos::new(0, 0));
        chunk.set_state(BlockPos::new(1, 2, 3), blocks.stone);
        let torch = blocks.facing(blocks.torch, Facing::South).unwrap();
        chunk.set_state(BlockPos::new(1, 3, 3), torch);

        let export = ChunkExport::from_chunk(&chunk);
        assert_eq!(export.blocks.len(), 2);
        let placed = export.blocks.iter().find(|b| b.block == "torch").unwrap();
        assert_eq!(placed.properties.get("facing").map(String::as_str), Some("south"));
        assert_eq!(placed.dense_id, (crate::blocks::TORCH << 4) | 3);

        let json = serde_json::to_value(&export).unwrap();
        let stone = json["blocks"]
            .as_array()
            .unwrap()
            .iter()
            .find(|b| b["block"] == "stone")
            .unwrap();
        assert!(stone.get("properties").is_none());
    }
}
