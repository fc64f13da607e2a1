use std::sync::Arc;

use super::nibble::NibbleChannel;
use super::packed::PackedArray;
use super::snapshot::SectionData;
use crate::error::StorageError;
use crate::registry::{BlockRegistry, DenseStateId};
use crate::state::BlockState;

/// Number of blocks along each axis of a chunk section.
pub const SECTION_SIZE: usize = 16;
/// Total block count in one section.
pub const SECTION_VOLUME: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;
/// Vertical bands in a chunk column.
pub const SECTION_COUNT: usize = 16;

/// Cell index in YZX order: `(y << 8) | (z << 4) | x`.
#[inline]
pub const fn index(x: usize, y: usize, z: usize) -> usize {
    (y << 8) | (z << 4) | x
}

/// A 16x16x16 cube of blocks with its light.
///
/// States are stored as [`DenseStateId`]s in a [`PackedArray`] wide enough for
/// the registry's largest id. The occupied and tickable counters are kept in
/// step with every write.
#[derive(Clone)]
pub struct SectionStorage {
    registry: Arc<BlockRegistry>,
    band: u8,
    states: PackedArray,
    block_light: NibbleChannel,
    sky_light: NibbleChannel,
    occupied: u16,
    tickable: u16,
}

impl SectionStorage {
    /// An all-default section for vertical band `band` (0..16).
    pub fn new(registry: Arc<BlockRegistry>, band: u8) -> Self {
        let mut states = PackedArray::new(registry.state_bits(), SECTION_VOLUME);
        let default = registry.dense_id(registry.default_state());
        if default.0 != 0 {
            states.fill(default.0 as u32);
        }
        Self {
            registry,
            band,
            states,
            block_light: NibbleChannel::new(),
            sky_light: NibbleChannel::new(),
            occupied: 0,
            tickable: 0,
        }
    }

    pub fn band(&self) -> u8 {
        self.band
    }

    /// Lowest world Y covered by this section.
    pub fn y_base(&self) -> i32 {
        self.band as i32 * SECTION_SIZE as i32
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    #[inline]
    pub fn dense_id(&self, x: usize, y: usize, z: usize) -> DenseStateId {
        DenseStateId(self.states.get(index(x, y, z)) as u16)
    }

    #[inline]
    fn decode(&self, raw: u32) -> BlockState {
        self.registry
            .state_by_id(DenseStateId(raw as u16), self.registry.default_state())
    }

    pub fn get_state(&self, x: usize, y: usize, z: usize) -> BlockState {
        self.decode(self.states.get(index(x, y, z)))
    }

    /// Write `state` and return what was stored before.
    pub fn set_state(&mut self, x: usize, y: usize, z: usize, state: BlockState) -> BlockState {
        let id = self.registry.dense_id(state);
        let raw = self.states.swap(index(x, y, z), id.0 as u32);
        let old = self.decode(raw);
        // metadata is lossy; count what the cell reads back as
        let stored = self.decode(id.0 as u32);

        let registry = &self.registry;
        if !registry.is_air(old) {
            self.occupied -= 1;
            if registry.is_tickable(old) {
                self.tickable -= 1;
            }
        }
        if !registry.is_air(stored) {
            self.occupied += 1;
            if registry.is_tickable(stored) {
                self.tickable += 1;
            }
        }
        old
    }

    /// Set every cell to `state`. Light is left untouched.
    pub fn fill(&mut self, state: BlockState) {
        self.states.fill(self.registry.dense_id(state).0 as u32);
        let stored = self.get_state(0, 0, 0);
        let (occupied, tickable) = if self.registry.is_air(stored) {
            (0, 0)
        } else if self.registry.is_tickable(stored) {
            (SECTION_VOLUME as u16, SECTION_VOLUME as u16)
        } else {
            (SECTION_VOLUME as u16, 0)
        };
        self.occupied = occupied;
        self.tickable = tickable;
    }

    /// Reset every cell to the registry default.
    pub fn clear(&mut self) {
        self.fill(self.registry.default_state());
    }

    /// Recount both counters from the stored cells.
    pub fn recalculate(&mut self) {
        let mut occupied = 0u16;
        let mut tickable = 0u16;
        for raw in self.states.iter() {
            let state = self.decode(raw);
            if !self.registry.is_air(state) {
                occupied += 1;
                if self.registry.is_tickable(state) {
                    tickable += 1;
                }
            }
        }
        self.occupied = occupied;
        self.tickable = tickable;
    }

    /// No non-air cells. Empty sections are skipped when saving and iterating.
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub fn occupied_count(&self) -> u16 {
        self.occupied
    }

    pub fn tickable_count(&self) -> u16 {
        self.tickable
    }

    pub fn needs_random_tick(&self) -> bool {
        self.tickable > 0
    }

    pub fn block_light(&self, x: usize, y: usize, z: usize) -> u8 {
        self.block_light.get(x, y, z)
    }

    pub fn set_block_light(&mut self, x: usize, y: usize, z: usize, value: u8) {
        self.block_light.set(x, y, z, value);
    }

    pub fn sky_light(&self, x: usize, y: usize, z: usize) -> u8 {
        self.sky_light.get(x, y, z)
    }

    pub fn set_sky_light(&mut self, x: usize, y: usize, z: usize, value: u8) {
        self.sky_light.set(x, y, z, value);
    }

    pub fn block_light_channel(&self) -> &NibbleChannel {
        &self.block_light
    }

    pub fn sky_light_channel(&self) -> &NibbleChannel {
        &self.sky_light
    }

    /// Split stored ids into the persisted block/add/data arrays.
    pub fn to_data(&self) -> SectionData {
        let mut blocks = vec![0u8; SECTION_VOLUME];
        let mut data = NibbleChannel::new();
        let mut add = NibbleChannel::new();
        let mut needs_add = false;
        for (i, raw) in self.states.iter().enumerate() {
            let id = DenseStateId(raw as u16);
            let block = id.block().0;
            blocks[i] = (block & 0xFF) as u8;
            data.set_index(i, id.metadata());
            if block > 0xFF {
                add.set_index(i, (block >> 8) as u8);
                needs_add = true;
            }
        }
        SectionData {
            y: self.band,
            blocks,
            add: needs_add.then(|| add.as_bytes().to_vec()),
            data: data.as_bytes().to_vec(),
            block_light: self.block_light.as_bytes().to_vec(),
            sky_light: self.sky_light.as_bytes().to_vec(),
        }
    }

    /// Rebuild a section from its persisted layout.
    ///
    /// Ids that no longer resolve are stored as the registry default.
    pub fn from_data(registry: Arc<BlockRegistry>, data: &SectionData) -> Result<Self, StorageError> {
        if data.y as usize >= SECTION_COUNT {
            return Err(StorageError::BandOutOfRange(data.y));
        }
        if data.blocks.len() != SECTION_VOLUME {
            return Err(StorageError::BadLength {
                field: "Blocks",
                expected: SECTION_VOLUME,
                actual: data.blocks.len(),
            });
        }
        let meta = NibbleChannel::from_bytes("Data", &data.data)?;
        let add = data
            .add
            .as_deref()
            .map(|bytes| NibbleChannel::from_bytes("Add", bytes))
            .transpose()?;

        let mut section = Self::new(Arc::clone(&registry), data.y);
        section.block_light = NibbleChannel::from_bytes("BlockLight", &data.block_light)?;
        section.sky_light = NibbleChannel::from_bytes("SkyLight", &data.sky_light)?;

        let default = registry.default_state();
        let mut unresolved = 0usize;
        for (i, &low) in data.blocks.iter().enumerate() {
            let high = add.as_ref().map_or(0, |add| add.get_index(i) as u16);
            let raw = DenseStateId((((high << 8) | low as u16) << 4) | meta.get_index(i) as u16);
            let state = registry.resolve(raw).unwrap_or_else(|| {
                unresolved += 1;
                default
            });
            section.states.set(i, registry.dense_id(state).0 as u32);
        }
        if unresolved > 0 {
            tracing::warn!(
                band = data.y,
                unresolved,
                "section holds unknown block states, replaced with default"
            );
        }
        section.recalculate();
        Ok(section)
    }
}

impl std::fmt::Debug for SectionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionStorage")
            .field("band", &self.band)
            .field("occupied", &self.occupied)
            .field("tickable", &self.tickable)
            .finish()
    }
}
