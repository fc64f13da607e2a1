use super::Chunk;
use crate::world::entity::EntityKey;
use crate::world::position::BlockPos;
use crate::world::section::SECTION_COUNT;
use crate::world::tile::{TileEntity, TileLookup};

impl Chunk {
    /// Valid tile entity at `pos`.
    ///
    /// An invalid entry is dropped on the spot. With nothing indexed,
    /// `Immediate` creates one from the block and `Queued` records the
    /// position for [`Chunk::take_queued_tiles`].
    pub fn tile(&mut self, pos: BlockPos, lookup: TileLookup) -> Option<&mut (dyn TileEntity + 'static)> {
        match self.tiles.get(&pos).map(|tile| tile.is_invalid()) {
            Some(true) => {
                self.tiles.remove(&pos);
                return None;
            }
            Some(false) => {}
            None => match lookup {
                TileLookup::Immediate => {
                    let tile = self.create_tile(pos)?;
                    self.add_tile(pos, tile).ok()?;
                }
                TileLookup::Queued => {
                    self.queued_tiles.push(pos);
                    return None;
                }
                TileLookup::Check => return None,
            },
        }
        self.tiles.get_mut(&pos).map(|tile| &mut **tile)
    }

    /// Read-only lookup that skips invalid entries without removing them.
    pub fn tile_ref(&self, pos: BlockPos) -> Option<&dyn TileEntity> {
        self.tiles
            .get(&pos)
            .filter(|tile| !tile.is_invalid())
            .map(|tile| &**tile)
    }

    /// Index `tile` at `pos`. Refused (and handed back) unless `pos` is in
    /// this chunk and its block provides tile entities. A tile already there
    /// is invalidated.
    pub fn add_tile(&mut self, pos: BlockPos, mut tile: Box<dyn TileEntity>) -> Result<(), Box<dyn TileEntity>> {
        if pos.chunk() != self.pos || !self.registry.provides_tile_entity(self.block(pos)) {
            return Err(tile);
        }
        if let Some(previous) = self.tiles.get_mut(&pos) {
            previous.invalidate();
        }
        tile.validate();
        self.tiles.insert(pos, tile);
        self.modified = true;
        Ok(())
    }

    /// Unindex and invalidate the tile at `pos`.
    pub fn remove_tile(&mut self, pos: BlockPos) -> Option<Box<dyn TileEntity>> {
        let mut tile = self.tiles.remove(&pos)?;
        tile.invalidate();
        self.modified = true;
        Some(tile)
    }

    pub fn tiles(&self) -> impl Iterator<Item = (BlockPos, &dyn TileEntity)> {
        self.tiles.iter().map(|(pos, tile)| (*pos, &**tile))
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Positions queued by [`TileLookup::Queued`] lookups.
    pub fn take_queued_tiles(&mut self) -> Vec<BlockPos> {
        std::mem::take(&mut self.queued_tiles)
    }

    fn create_tile(&self, pos: BlockPos) -> Option<Box<dyn TileEntity>> {
        let state = self.registry.state(self.state(pos));
        let behavior = state.block().behavior();
        if !behavior.provides_tile_entity() {
            return None;
        }
        behavior.create_tile_entity(state)
    }

    /// Make sure the tile-providing block at `pos` has a tile, then reset
    /// its cached state.
    pub(super) fn ensure_tile(&mut self, pos: BlockPos) {
        if self.tile(pos, TileLookup::Check).is_none() {
            if let Some(tile) = self.create_tile(pos) {
                if self.add_tile(pos, tile).is_err() {
                    tracing::trace!(?pos, "tile entity refused after block change");
                }
            }
        }
        if let Some(tile) = self.tile(pos, TileLookup::Check) {
            tile.reset_cached_state();
        }
    }

    /// Bucket `entity` by `floor(y / 16)`, clamped to the column. Returns the
    /// bucket used.
    pub fn add_entity(&mut self, entity: EntityKey, y: f64) -> usize {
        let bucket = Self::entity_bucket(y);
        self.entities[bucket].push(entity);
        bucket
    }

    /// Remove `entity` from `bucket` (clamped). Returns whether it was there.
    pub fn remove_entity(&mut self, entity: EntityKey, bucket: usize) -> bool {
        let list = &mut self.entities[bucket.min(SECTION_COUNT - 1)];
        match list.iter().position(|&key| key == entity) {
            Some(index) => {
                list.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn entities_in(&self, bucket: usize) -> &[EntityKey] {
        self.entities
            .get(bucket)
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn has_entities(&self) -> bool {
        self.entities.iter().any(|bucket| !bucket.is_empty())
    }

    pub fn entity_bucket(y: f64) -> usize {
        let band = (y / 16.0).floor();
        band.clamp(0.0, (SECTION_COUNT - 1) as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Arc;

    use slotmap::SlotMap;

    use super::*;
    use crate::registry::{BasicBlock, Block, BlockRegistry};
    use crate::state::{BlockState, StateRef};
    use crate::world::position::ChunkPos;

    #[derive(Debug, Default)]
    struct Crate {
        invalid: bool,
        resets: u32,
    }

    impl TileEntity for Crate {
        fn is_invalid(&self) -> bool {
            self.invalid
        }

        fn invalidate(&mut self) {
            self.invalid = true;
        }

        fn validate(&mut self) {
            self.invalid = false;
        }

        fn reset_cached_state(&mut self) {
            self.resets += 1;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct CrateBlock;

    impl Block for CrateBlock {
        fn provides_tile_entity(&self) -> bool {
            true
        }

        fn create_tile_entity(&self, _state: StateRef<'_>) -> Option<Box<dyn TileEntity>> {
            Some(Box::new(Crate::default()))
        }
    }

    fn setup() -> (Chunk, BlockState, BlockState) {
        let mut builder = BlockRegistry::builder();
        builder.register(0, "air", &[], BasicBlock::air()).unwrap();
        builder.register(1, "stone", &[], BasicBlock::solid()).unwrap();
        builder.register(54, "crate", &[], CrateBlock).unwrap();
        let registry = builder.build().unwrap();
        let stone = registry.block_by_name("stone").unwrap().default_state().handle();
        let crate_block = registry.block_by_name("crate").unwrap().default_state().handle();
        (Chunk::empty(Arc::clone(&registry), ChunkPos::new(0, 0)), stone, crate_block)
    }

    fn resets(chunk: &Chunk, pos: BlockPos) -> u32 {
        let tile = chunk.tile_ref(pos).unwrap();
        tile.as_any().downcast_ref::<Crate>().unwrap().resets
    }

    #[test]
    fn placing_tile_block_creates_tile() {
        let (mut chunk, stone, crate_block) = setup();
        let pos = BlockPos::new(1, 64, 1);
        chunk.set_state(pos, crate_block);
        assert_eq!(chunk.tile_count(), 1);
        assert_eq!(resets(&chunk, pos), 1);

        chunk.set_state(pos, stone);
        assert_eq!(chunk.tile_count(), 0);
        assert!(chunk.tile(pos, TileLookup::Check).is_none());
    }

    #[test]
    fn invalid_tile_is_dropped_on_lookup() {
        let (mut chunk, _, crate_block) = setup();
        let pos = BlockPos::new(2, 3, 4);
        chunk.set_state(pos, crate_block);
        chunk.tile(pos, TileLookup::Check).unwrap().invalidate();
        assert_eq!(chunk.tile_count(), 1);
        assert!(chunk.tile(pos, TileLookup::Check).is_none());
        assert_eq!(chunk.tile_count(), 0);

        assert!(chunk.tile(pos, TileLookup::Queued).is_none());
        assert_eq!(chunk.take_queued_tiles(), vec![pos]);
        assert!(chunk.tile(pos, TileLookup::Immediate).is_some());
        assert_eq!(chunk.tile_count(), 1);
    }

    #[test]
    fn add_tile_requires_provider_block() {
        let (mut chunk, stone, crate_block) = setup();
        let pos = BlockPos::new(0, 10, 0);
        chunk.set_state(pos, stone);
        assert!(chunk.add_tile(pos, Box::new(Crate::default())).is_err());
        assert!(chunk.tile(pos, TileLookup::Immediate).is_none());

        chunk.set_state(pos, crate_block);
        assert!(chunk.add_tile(BlockPos::new(16, 10, 0), Box::new(Crate::default())).is_err());
        let replacement = Crate {
            invalid: true,
            resets: 7,
        };
        assert!(chunk.add_tile(pos, Box::new(replacement)).is_ok());
        assert_eq!(resets(&chunk, pos), 7);

        let removed = chunk.remove_tile(pos).unwrap();
        assert!(removed.is_invalid());
        assert!(chunk.tile_ref(pos).is_none());
    }

    #[test]
    fn entity_buckets_clamp_to_column() {
        let (mut chunk, _, _) = setup();
        let mut keys: SlotMap<EntityKey, ()> = SlotMap::with_key();
        let low = keys.insert(());
        let mid = keys.insert(());
        let high = keys.insert(());
        assert_eq!(chunk.add_entity(low, -20.0), 0);
        assert_eq!(chunk.add_entity(mid, 33.5), 2);
        assert_eq!(chunk.add_entity(high, 900.0), 15);
        assert!(chunk.has_entities());
        assert_eq!(chunk.entities_in(2), &[mid]);

        assert!(chunk.remove_entity(high, 40));
        assert!(!chunk.remove_entity(mid, 3));
        assert!(chunk.remove_entity(mid, 2));
        assert!(chunk.remove_entity(low, 0));
        assert!(!chunk.has_entities());
        assert!(chunk.entities_in(99).is_empty());
    }
}
