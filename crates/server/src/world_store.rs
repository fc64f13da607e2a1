//! Loaded chunks and their save bookkeeping.
//!
//! One tick task owns the store; every mutation goes through `&mut self`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use blockstore_engine::registry::BlockRegistry;
use blockstore_engine::state::BlockState;
use blockstore_engine::world::chunk::SkyRelight;
use blockstore_engine::world::entity::EntityKey;
use blockstore_engine::world::tile::TileLookup;
use blockstore_engine::world::{BlockPos, Chunk, ChunkPos, ChunkSnapshot, StateChange};

/// What one [`ChunkStore::tick`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    /// Columns whose sky light was re-walked.
    pub relit_columns: usize,
    /// Relight requests for columns in chunks that are not loaded.
    pub dropped_relights: usize,
    pub tiles_created: usize,
    /// Sections holding at least one tickable block.
    pub tickable_sections: usize,
}

/// A chunk removed from the store.
#[derive(Debug)]
pub struct Unloaded {
    pub snapshot: ChunkSnapshot,
    /// Whether the snapshot holds changes not yet on disk.
    pub needs_save: bool,
    /// Entities that were still bucketed in the chunk.
    pub entities: Vec<EntityKey>,
}

/// The loaded part of the world.
pub struct ChunkStore {
    registry: Arc<BlockRegistry>,
    chunks: HashMap<ChunkPos, Chunk>,
    ticks: u64,
}

impl ChunkStore {
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self {
            registry,
            chunks: HashMap::new(),
            ticks: 0,
        }
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    /// Insert a chunk without marking it dirty (used for generation/loading).
    pub fn insert(&mut self, mut chunk: Chunk) {
        chunk.mark_saved();
        self.chunks.insert(chunk.pos(), chunk);
    }

    pub fn get(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn get_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(&pos)
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// State at an absolute position. Unloaded chunks read as the default.
    pub fn state(&self, pos: BlockPos) -> BlockState {
        match self.chunks.get(&pos.chunk()) {
            Some(chunk) => chunk.state(pos),
            None => self.registry.default_state(),
        }
    }

    /// Write a state at an absolute position. Creates an empty chunk if
    /// none is loaded there.
    pub fn set_state(&mut self, pos: BlockPos, state: BlockState) -> StateChange {
        let chunk_pos = pos.chunk();
        self.chunks
            .entry(chunk_pos)
            .or_insert_with(|| Chunk::empty(Arc::clone(&self.registry), chunk_pos))
            .set_state(pos, state)
    }

    /// Positions of chunks with unsaved changes.
    pub fn dirty_chunks(&self) -> Vec<ChunkPos> {
        self.chunks
            .values()
            .filter(|chunk| chunk.is_modified())
            .map(Chunk::pos)
            .collect()
    }

    pub fn dirty_count(&self) -> usize {
        self.chunks.values().filter(|chunk| chunk.is_modified()).count()
    }

    /// Snapshot every modified chunk and mark it saved.
    ///
    /// The snapshots are detached, so they can be written on another thread
    /// while ticking continues.
    pub fn take_dirty_snapshots(&mut self) -> Vec<ChunkSnapshot> {
        self.chunks
            .values_mut()
            .filter(|chunk| chunk.is_modified())
            .map(|chunk| {
                chunk.mark_saved();
                chunk.snapshot()
            })
            .collect()
    }

    pub fn unload(&mut self, pos: ChunkPos) -> Option<Unloaded> {
        let unloading = self.chunks.remove(&pos)?.begin_unload();
        let needs_save = unloading.is_modified();
        let entities: Vec<EntityKey> = unloading.entities().collect();
        if !entities.is_empty() {
            tracing::debug!(chunk = ?pos, entities = entities.len(), "unloading chunk with entities");
        }
        Some(Unloaded {
            snapshot: unloading.flush(),
            needs_save,
            entities,
        })
    }

    /// Unload everything, returning the snapshots that still need saving.
    pub fn unload_all(&mut self) -> Vec<ChunkSnapshot> {
        let positions: Vec<ChunkPos> = self.chunks.keys().copied().collect();
        positions
            .into_iter()
            .filter_map(|pos| self.unload(pos))
            .filter(|unloaded| unloaded.needs_save)
            .map(|unloaded| unloaded.snapshot)
            .collect()
    }

    /// Advance one tick: gap rechecks, queued tile entities, sky relights.
    pub fn tick(&mut self) -> TickStats {
        self.ticks += 1;
        let mut stats = TickStats::default();
        let mut relights: Vec<SkyRelight> = Vec::new();

        for chunk in self.chunks.values_mut() {
            chunk.tick();
            relights.extend(chunk.take_sky_relights());
            for pos in chunk.take_queued_tiles() {
                if chunk.tile(pos, TileLookup::Immediate).is_some() {
                    stats.tiles_created += 1;
                }
            }
            stats.tickable_sections += chunk.sections().filter(|s| s.needs_random_tick()).count();
        }

        let columns: HashSet<(i32, i32)> = relights.iter().map(|r| (r.x, r.z)).collect();
        for (x, z) in columns {
            let pos = BlockPos::new(x, 0, z);
            match self.chunks.get_mut(&pos.chunk()) {
                Some(chunk) => {
                    let local = pos.local();
                    chunk.check_sky_column(local.x as usize, local.z as usize);
                    stats.relit_columns += 1;
                }
                None => stats.dropped_relights += 1,
            }
        }
        if stats.relit_columns > 0 {
            tracing::trace!(tick = self.ticks, ?stats, "tick");
        }
        stats
    }
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("chunks", &self.chunks.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{BlockSet, ChestTile};
    use crate::generation;

    fn store(blocks: &BlockSet, radius: i32) -> ChunkStore {
        let mut store = ChunkStore::new(Arc::clone(&blocks.registry));
        let buffer = generation::flat_buffer(blocks);
        for chunk in generation::generate_area(&blocks.registry, &buffer, radius).unwrap() {
            store.insert(chunk);
        }
        store
    }

    #[test]
    fn inserted_chunks_start_clean() {
        let blocks = BlockSet::register().unwrap();
        let store = store(&blocks, 1);
        assert_eq!(store.chunk_count(), 4);
        assert_eq!(store.dirty_count(), 0);
        assert_eq!(store.state(BlockPos::new(-1, 65, -1)), blocks.grass);
        assert_eq!(store.state(BlockPos::new(100, 65, 100)), blocks.air);
    }

    #[test]
    fn writes_mark_chunks_dirty() {
        let blocks = BlockSet::register().unwrap();
        let mut store = store(&blocks, 1);
        let change = store.set_state(BlockPos::new(3, 66, 3), blocks.stone);
        assert_eq!(change, StateChange::Replaced(blocks.air));
        assert_eq!(store.dirty_chunks(), vec![ChunkPos::new(0, 0)]);

        let snapshots = store.take_dirty_snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(store.dirty_count(), 0);

        store.set_state(BlockPos::new(100, 10, 100), blocks.stone);
        assert!(store.has_chunk(ChunkPos::new(6, 6)));
    }

    #[test]
    fn digging_relights_neighbouring_columns() {
        let blocks = BlockSet::register().unwrap();
        let mut store = store(&blocks, 1);
        store.set_state(BlockPos::new(7, 65, 4), blocks.air);
        store.set_state(BlockPos::new(7, 64, 4), blocks.air);

        let stats = store.tick();
        assert_eq!(stats.relit_columns, 5);
        assert_eq!(stats.dropped_relights, 0);
        let chunk = store.get(ChunkPos::new(0, 0)).unwrap();
        assert_eq!(chunk.height(7, 4), 64);
        assert_eq!(stats.tickable_sections, 4);
    }

    #[test]
    fn relights_outside_loaded_chunks_are_dropped() {
        let blocks = BlockSet::register().unwrap();
        let mut store = store(&blocks, 1);
        // (15, 4) borders chunk (1, 0), which is not loaded
        store.set_state(BlockPos::new(15, 65, 4), blocks.air);
        let stats = store.tick();
        assert_eq!(stats.relit_columns, 4);
        assert_eq!(stats.dropped_relights, 1);
    }

    #[test]
    fn queued_tiles_are_created_on_tick() {
        let blocks = BlockSet::register().unwrap();
        let mut store = store(&blocks, 1);
        let pos = BlockPos::new(2, 66, 2);
        store.set_state(pos, blocks.chest);
        let chunk = store.get_mut(ChunkPos::new(0, 0)).unwrap();
        chunk.remove_tile(pos);
        assert!(chunk.tile(pos, TileLookup::Queued).is_none());

        let stats = store.tick();
        assert_eq!(stats.tiles_created, 1);
        let chunk = store.get(ChunkPos::new(0, 0)).unwrap();
        let tile = chunk.tile_ref(pos).unwrap();
        assert!(tile.as_any().downcast_ref::<ChestTile>().is_some());
    }

    #[test]
    fn unload_all_returns_only_modified_snapshots() {
        let blocks = BlockSet::register().unwrap();
        let mut store = store(&blocks, 1);
        store.set_state(BlockPos::new(-5, 70, 3), blocks.torch);
        let snapshots = store.unload_all();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].pos(), ChunkPos::new(-1, 0));
        assert_eq!(store.chunk_count(), 0);
    }
}
