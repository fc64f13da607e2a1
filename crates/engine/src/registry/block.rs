use crate::state::{BlockState, StateRef};
use crate::world::chunk::Chunk;
use crate::world::position::BlockPos;
use crate::world::tile::TileEntity;

/// Per-block behavior the storage layer consults.
///
/// Every method has a default matching a plain opaque solid block, so most
/// implementations only override what differs.
pub trait Block: Send + Sync + 'static {
    /// Air cells do not count as occupied and never allocate a section.
    fn is_air(&self, _state: StateRef<'_>) -> bool {
        false
    }

    /// Sky light lost passing through this block (0..=15).
    fn light_opacity(&self, _state: StateRef<'_>) -> u8 {
        15
    }

    /// Light emitted by this block (0..=15).
    fn light_value(&self, _state: StateRef<'_>) -> u8 {
        0
    }

    /// Whether sections holding this state need random ticks.
    fn is_tickable(&self, _state: StateRef<'_>) -> bool {
        false
    }

    /// Whether rain and snow stop at this block.
    fn blocks_precipitation(&self, state: StateRef<'_>) -> bool {
        !self.is_air(state)
    }

    /// 4-bit projection of `state` for compact storage. Bits above the low
    /// nibble are discarded.
    ///
    /// Called while the registry is being built, before any dense id is
    /// assigned: `state.dense_id()` reads as id 0 here.
    fn metadata_from_state(&self, state: StateRef<'_>) -> u8 {
        (state.local_index() & 0x0F) as u8
    }

    /// Rebuild a state from `metadata`, starting from the block's default.
    /// `None` when the nibble means nothing for this block.
    fn state_from_metadata<'r>(&self, default: StateRef<'r>, metadata: u8) -> Option<StateRef<'r>> {
        default.variant(metadata as usize)
    }

    fn provides_tile_entity(&self) -> bool {
        false
    }

    fn create_tile_entity(&self, _state: StateRef<'_>) -> Option<Box<dyn TileEntity>> {
        None
    }

    /// Runs after this block is written over a different block.
    fn on_added(&self, _chunk: &mut Chunk, _pos: BlockPos, _state: BlockState) {}

    /// Runs after this block was replaced by a different block.
    fn on_removed(&self, _chunk: &mut Chunk, _pos: BlockPos, _state: BlockState) {}
}

/// Data-driven block with no properties of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicBlock {
    pub air: bool,
    pub opacity: u8,
    pub light: u8,
    pub tickable: bool,
    pub blocks_precipitation: bool,
}

impl BasicBlock {
    pub const fn air() -> Self {
        Self {
            air: true,
            opacity: 0,
            light: 0,
            tickable: false,
            blocks_precipitation: false,
        }
    }

    pub const fn solid() -> Self {
        Self {
            air: false,
            opacity: 15,
            light: 0,
            tickable: false,
            blocks_precipitation: true,
        }
    }

    /// Solid for precipitation but lets light through (glass).
    pub const fn transparent() -> Self {
        Self {
            opacity: 0,
            ..Self::solid()
        }
    }

    pub const fn with_opacity(self, opacity: u8) -> Self {
        Self { opacity, ..self }
    }

    pub const fn with_light(self, light: u8) -> Self {
        Self { light, ..self }
    }

    pub const fn ticking(self) -> Self {
        Self {
            tickable: true,
            ..self
        }
    }

    pub const fn passable(self) -> Self {
        Self {
            blocks_precipitation: false,
            ..self
        }
    }
}

impl Block for BasicBlock {
    fn is_air(&self, _state: StateRef<'_>) -> bool {
        self.air
    }

    fn light_opacity(&self, _state: StateRef<'_>) -> u8 {
        self.opacity
    }

    fn light_value(&self, _state: StateRef<'_>) -> u8 {
        self.light
    }

    fn is_tickable(&self, _state: StateRef<'_>) -> bool {
        self.tickable
    }

    fn blocks_precipitation(&self, _state: StateRef<'_>) -> bool {
        self.blocks_precipitation
    }
}
