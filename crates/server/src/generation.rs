//! Flat terrain producer.
//!
//! Produces the raw generation buffer the engine consumes; chunks are built
//! from it in parallel, one chunk per rayon task.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use blockstore_engine::registry::{BlockRegistry, DenseStateId};
use blockstore_engine::world::chunk::{COLUMN_HEIGHT, GENERATION_BUFFER_LEN};
use blockstore_engine::world::{Chunk, ChunkPos};
use rayon::prelude::*;

use crate::blocks::BlockSet;

/// Bedrock floor of the flat world.
pub const FLOOR_Y: i32 = 60;
/// First air block above the surface.
pub const SURFACE_Y: i32 = 66;

/// Layer stack from the floor up: bedrock, three stone, dirt, grass.
fn layer_at(blocks: &BlockSet, y: i32) -> Option<DenseStateId> {
    let state = match y {
        FLOOR_Y => blocks.bedrock,
        61..=63 => blocks.stone,
        64 => blocks.dirt,
        65 => blocks.grass,
        _ => return None,
    };
    Some(blocks.registry.dense_id(state))
}

/// One chunk's worth of dense ids, indexed `(x << 12) | (z << 8) | y`.
pub fn flat_buffer(blocks: &BlockSet) -> Vec<DenseStateId> {
    let air = blocks.registry.dense_id(blocks.air);
    let column: Vec<DenseStateId> = (0..COLUMN_HEIGHT)
        .map(|y| layer_at(blocks, y).unwrap_or(air))
        .collect();
    let mut buffer = Vec::with_capacity(GENERATION_BUFFER_LEN);
    for _ in 0..GENERATION_BUFFER_LEN / column.len() {
        buffer.extend_from_slice(&column);
    }
    buffer
}

/// Build every chunk within `radius` of (0, 0) from `buffer`.
pub fn generate_area(
    registry: &Arc<BlockRegistry>,
    buffer: &[DenseStateId],
    radius: i32,
) -> Result<Vec<Chunk>> {
    let start = Instant::now();
    let positions: Vec<ChunkPos> = (-radius..radius)
        .flat_map(|x| (-radius..radius).map(move |z| ChunkPos::new(x, z)))
        .collect();

    let chunks = positions
        .par_iter()
        .map(|&pos| {
            Chunk::generate(Arc::clone(registry), pos, buffer)
                .with_context(|| format!("generating chunk ({}, {})", pos.x, pos.z))
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        chunks = chunks.len(),
        elapsed = ?start.elapsed(),
        "generated flat terrain"
    );
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore_engine::world::BlockPos;

    #[test]
    fn buffer_stacks_layers() {
        let blocks = BlockSet::register().unwrap();
        let buffer = flat_buffer(&blocks);
        assert_eq!(buffer.len(), GENERATION_BUFFER_LEN);
        let at = |x: usize, z: usize, y: usize| buffer[(x << 12) | (z << 8) | y];
        assert_eq!(at(0, 0, 60), blocks.registry.dense_id(blocks.bedrock));
        assert_eq!(at(7, 3, 65), blocks.registry.dense_id(blocks.grass));
        assert_eq!(at(15, 15, 66), blocks.registry.dense_id(blocks.air));
    }

    #[test]
    fn area_is_generated_in_parallel() {
        let blocks = BlockSet::register().unwrap();
        let buffer = flat_buffer(&blocks);
        let chunks = generate_area(&blocks.registry, &buffer, 1).unwrap();
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert_eq!(chunk.height(3, 3), SURFACE_Y);
            let origin = chunk.pos().block_origin(FLOOR_Y);
            assert_eq!(chunk.state(origin), blocks.bedrock);
            assert_eq!(chunk.state(BlockPos::new(origin.x, 65, origin.z)), blocks.grass);
            assert_eq!(chunk.occupied_count(), 6 * 256);
        }
    }
}
