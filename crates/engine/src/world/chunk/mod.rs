//! A 16x256x16 column of sections with its height, light and index data.

mod iter;
mod lifecycle;
mod light;
mod tiles;

use std::collections::HashMap;
use std::sync::Arc;

pub use iter::ChunkStates;
pub use lifecycle::UnloadingChunk;

use super::entity::EntityKey;
use super::position::{BlockPos, ChunkPos};
use super::section::{SECTION_COUNT, SECTION_SIZE, SectionStorage};
use super::snapshot::ChunkSnapshot;
use super::tile::TileEntity;
use crate::error::StorageError;
use crate::registry::{BlockId, BlockRegistry, DenseStateId};
use crate::state::BlockState;

/// World height covered by one chunk.
pub const COLUMN_HEIGHT: i32 = (SECTION_COUNT * SECTION_SIZE) as i32;
/// Cells in one column of a chunk (x, z pair).
pub const COLUMNS: usize = SECTION_SIZE * SECTION_SIZE;
/// Generation buffer length: one dense id per cell of the chunk.
pub const GENERATION_BUFFER_LEN: usize = COLUMNS * COLUMN_HEIGHT as usize;
/// Precipitation map marker meaning "recompute on next read".
pub const UNKNOWN_PRECIPITATION: i32 = -999;

/// Outcome of [`Chunk::set_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// The write happened; holds the state that was there before.
    Replaced(BlockState),
    /// Nothing was written, or a removal hook overrode the write.
    Unchanged,
}

impl StateChange {
    pub fn previous(self) -> Option<BlockState> {
        match self {
            StateChange::Replaced(state) => Some(state),
            StateChange::Unchanged => None,
        }
    }

    pub fn is_changed(self) -> bool {
        matches!(self, StateChange::Replaced(_))
    }
}

/// Sky light in world column `(x, z)` over `y_start..y_end` needs a recheck.
///
/// Raised by height changes and gap rechecks. The column may belong to a
/// neighbouring chunk; routing it is the world's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkyRelight {
    pub x: i32,
    pub z: i32,
    pub y_start: i32,
    pub y_end: i32,
}

/// A loaded chunk column.
///
/// Bands without a section read as the registry default. Every mutating
/// operation takes `&mut self`; nothing here locks.
pub struct Chunk {
    registry: Arc<BlockRegistry>,
    pos: ChunkPos,
    sections: [Option<SectionStorage>; SECTION_COUNT],
    height_map: [i32; COLUMNS],
    precipitation: [i32; COLUMNS],
    lowest_height: i32,
    gaps: [bool; COLUMNS],
    gap_check: bool,
    relights: Vec<SkyRelight>,
    tiles: HashMap<BlockPos, Box<dyn TileEntity>>,
    queued_tiles: Vec<BlockPos>,
    entities: [Vec<EntityKey>; SECTION_COUNT],
    modified: bool,
}

impl Chunk {
    /// An all-default chunk with no sections.
    pub fn empty(registry: Arc<BlockRegistry>, pos: ChunkPos) -> Self {
        Self {
            registry,
            pos,
            sections: std::array::from_fn(|_| None),
            height_map: [0; COLUMNS],
            precipitation: [UNKNOWN_PRECIPITATION; COLUMNS],
            lowest_height: 0,
            gaps: [false; COLUMNS],
            gap_check: false,
            relights: Vec::new(),
            tiles: HashMap::new(),
            queued_tiles: Vec::new(),
            entities: std::array::from_fn(|_| Vec::new()),
            modified: false,
        }
    }

    /// Build a chunk from a generation buffer indexed `(x << 12) | (z << 8) | y`.
    ///
    /// Air cells never allocate a section. Sky light and heights are computed
    /// once the buffer is applied.
    pub fn generate(
        registry: Arc<BlockRegistry>,
        pos: ChunkPos,
        buffer: &[DenseStateId],
    ) -> Result<Self, StorageError> {
        if buffer.len() != GENERATION_BUFFER_LEN {
            return Err(StorageError::BufferLength {
                expected: GENERATION_BUFFER_LEN,
                actual: buffer.len(),
            });
        }
        let mut chunk = Self::empty(Arc::clone(&registry), pos);
        let default = registry.default_state();
        for (i, &id) in buffer.iter().enumerate() {
            let state = registry.state_by_id(id, default);
            if registry.is_air(state) {
                continue;
            }
            let (x, z, y) = (i >> 12, (i >> 8) & 0xF, i & 0xFF);
            let band = y >> 4;
            chunk.sections[band]
                .get_or_insert_with(|| SectionStorage::new(Arc::clone(&registry), band as u8))
                .set_state(x, y & 0xF, z, state);
        }
        chunk.generate_sky_light_map();
        Ok(chunk)
    }

    /// Rebuild a chunk from a persisted snapshot. An empty height map is
    /// recomputed from the blocks.
    pub fn load(registry: Arc<BlockRegistry>, snapshot: &ChunkSnapshot) -> Result<Self, StorageError> {
        let mut chunk = Self::empty(Arc::clone(&registry), snapshot.pos());
        for data in &snapshot.sections {
            let section = SectionStorage::from_data(Arc::clone(&registry), data)?;
            chunk.sections[data.y as usize] = Some(section);
        }
        match snapshot.height_map.len() {
            0 => chunk.generate_height_map(),
            COLUMNS => {
                chunk.height_map.copy_from_slice(&snapshot.height_map);
                chunk.lowest_height = chunk.height_map.iter().copied().min().unwrap_or(0);
            }
            actual => {
                return Err(StorageError::HeightMapLength {
                    expected: COLUMNS,
                    actual,
                });
            }
        }
        chunk.modified = false;
        Ok(chunk)
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    /// State at `pos`; only the low 4 bits of x and z are used. Out-of-range
    /// Y and absent sections read as the registry default.
    pub fn state(&self, pos: BlockPos) -> BlockState {
        let local = pos.local();
        self.state_at(local.x as usize, local.y, local.z as usize)
    }

    pub fn state_at(&self, x: usize, y: i32, z: usize) -> BlockState {
        match self.section_at(y) {
            Some(section) => section.get_state(x, (y & 0xF) as usize, z),
            None => self.registry.default_state(),
        }
    }

    pub fn block(&self, pos: BlockPos) -> BlockId {
        self.registry.block_of(self.state(pos))
    }

    /// Write `state` at `pos`, keeping heights, light and tile entities in
    /// step.
    pub fn set_state(&mut self, pos: BlockPos, state: BlockState) -> StateChange {
        let local = pos.local();
        let (x, y, z) = (local.x as usize, local.y, local.z as usize);
        if !(0..COLUMN_HEIGHT).contains(&y) {
            return StateChange::Unchanged;
        }
        let old = self.state_at(x, y, z);
        if old == state {
            return StateChange::Unchanged;
        }

        let registry = Arc::clone(&self.registry);
        let column = local.column();
        if y >= self.precipitation[column] - 1 {
            self.precipitation[column] = UNKNOWN_PRECIPITATION;
        }
        let height = self.height_map[column];
        let band = local.section_index() as usize;

        let mut fresh = false;
        if self.sections[band].is_none() {
            if registry.is_air(state) {
                return StateChange::Unchanged;
            }
            tracing::trace!(chunk = ?self.pos, band, "allocating section");
            self.sections[band] = Some(SectionStorage::new(Arc::clone(&registry), band as u8));
            fresh = y >= height;
        }
        if let Some(section) = self.sections[band].as_mut() {
            section.set_state(x, local.section_local_y() as usize, z, state);
        }

        let old_block = registry.block_of(old);
        let new_block = registry.block_of(state);
        if old_block != new_block {
            registry.state(old).block().behavior().on_removed(self, pos, old);
            if registry.provides_tile_entity(old_block) {
                self.remove_tile(pos);
            }
        }
        if registry.block_of(self.state_at(x, y, z)) != new_block {
            self.modified = true;
            return StateChange::Unchanged;
        }

        if fresh {
            self.generate_sky_light_map();
        } else {
            let new_opacity = registry.light_opacity(state);
            let old_opacity = registry.light_opacity(old);
            if new_opacity > 0 {
                if y >= height {
                    self.relight_column(x, y + 1, z);
                }
            } else if y == height - 1 {
                self.relight_column(x, y, z);
            }
            if new_opacity != old_opacity
                && (new_opacity < old_opacity
                    || self.light_for(super::LightChannel::Sky, pos) > 0
                    || self.light_for(super::LightChannel::Block, pos) > 0)
            {
                self.mark_gap(column);
            }
        }

        if registry.provides_tile_entity(old_block) {
            if let Some(tile) = self.tile(pos, super::tile::TileLookup::Check) {
                tile.reset_cached_state();
            }
        }
        if old_block != new_block {
            registry.state(state).block().behavior().on_added(self, pos, state);
        }
        if registry.provides_tile_entity(new_block) {
            self.ensure_tile(pos);
        }

        self.modified = true;
        StateChange::Replaced(old)
    }

    /// The section for vertical band `band`, if allocated.
    pub fn section(&self, band: usize) -> Option<&SectionStorage> {
        self.sections.get(band)?.as_ref()
    }

    fn section_at(&self, y: i32) -> Option<&SectionStorage> {
        if !(0..COLUMN_HEIGHT).contains(&y) {
            return None;
        }
        self.sections[(y >> 4) as usize].as_ref()
    }

    /// Allocated sections, bottom to top.
    pub fn sections(&self) -> impl Iterator<Item = &SectionStorage> {
        self.sections.iter().flatten()
    }

    /// `y_base` of the highest allocated section, or 0 when none are.
    pub fn top_filled_segment(&self) -> i32 {
        self.sections
            .iter()
            .rev()
            .flatten()
            .next()
            .map_or(0, SectionStorage::y_base)
    }

    /// Whether every band overlapping `start_y..=end_y` is absent or empty.
    pub fn is_empty_between(&self, start_y: i32, end_y: i32) -> bool {
        let start = start_y.max(0);
        let end = end_y.min(COLUMN_HEIGHT - 1);
        (start..=end)
            .step_by(SECTION_SIZE)
            .all(|y| self.section_at(y).is_none_or(SectionStorage::is_empty))
    }

    /// Whether anything was written since the last [`Chunk::mark_saved`].
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Detached copy of the non-empty sections and the height map.
    pub fn snapshot(&self) -> ChunkSnapshot {
        ChunkSnapshot {
            x: self.pos.x,
            z: self.pos.z,
            sections: self
                .sections()
                .filter(|section| !section.is_empty())
                .map(SectionStorage::to_data)
                .collect(),
            height_map: self.height_map.to_vec(),
        }
    }

    /// Run the per-tick bookkeeping: pending gap rechecks.
    pub fn tick(&mut self) {
        if self.gap_check {
            self.recheck_gaps();
        }
    }

    /// Number of non-air cells across all sections.
    pub fn occupied_count(&self) -> usize {
        self.sections().map(|s| s.occupied_count() as usize).sum()
    }

    pub fn begin_unload(self) -> UnloadingChunk {
        UnloadingChunk::new(self)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("sections", &self.sections().count())
            .field("tiles", &self.tiles.len())
            .field("modified", &self.modified)
            .finish()
    }
}
