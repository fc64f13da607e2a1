//! The block set this server registers.
//!
//! Dense block ids follow the legacy numeric ids so saved chunks stay
//! readable by old-format tools.

use std::any::Any;
use std::sync::Arc;

use anyhow::{Context, Result};
use blockstore_engine::registry::{BasicBlock, Block, BlockRegistry};
use blockstore_engine::state::{BlockState, Facing, Property, StateRef, StateView};
use blockstore_engine::world::tile::TileEntity;

pub const AIR: u16 = 0;
pub const STONE: u16 = 1;
pub const GRASS: u16 = 2;
pub const DIRT: u16 = 3;
pub const SAPLING: u16 = 6;
pub const BEDROCK: u16 = 7;
pub const WATER: u16 = 9;
pub const GLASS: u16 = 20;
pub const TORCH: u16 = 50;
pub const CHEST: u16 = 54;

/// Properties shared between block definitions and callers.
#[derive(Debug, Clone)]
pub struct Properties {
    pub facing: Property<Facing>,
    pub level: Property<i32>,
    pub stage: Property<i32>,
}

impl Properties {
    fn new() -> Result<Self> {
        Ok(Self {
            facing: Property::new("facing", Facing::HORIZONTAL)?,
            level: Property::int_range("level", 0, 15)?,
            stage: Property::int_range("stage", 0, 1)?,
        })
    }
}

/// The registry plus handles to the default state of every block.
#[derive(Debug, Clone)]
pub struct BlockSet {
    pub registry: Arc<BlockRegistry>,
    pub properties: Properties,
    pub air: BlockState,
    pub stone: BlockState,
    pub grass: BlockState,
    pub dirt: BlockState,
    pub sapling: BlockState,
    pub bedrock: BlockState,
    pub water: BlockState,
    pub glass: BlockState,
    pub torch: BlockState,
    pub chest: BlockState,
}

impl BlockSet {
    pub fn register() -> Result<Self> {
        let properties = Properties::new()?;
        let facing = properties.facing.erased();

        let mut builder = BlockRegistry::builder();
        builder.register(AIR, "air", &[], BasicBlock::air())?;
        builder.register(STONE, "stone", &[], BasicBlock::solid())?;
        builder.register(GRASS, "grass", &[], BasicBlock::solid().ticking())?;
        builder.register(DIRT, "dirt", &[], BasicBlock::solid())?;
        builder.register(
            SAPLING,
            "sapling",
            &[properties.stage.erased()],
            Sapling {
                stage: properties.stage.clone(),
            },
        )?;
        builder.register(BEDROCK, "bedrock", &[], BasicBlock::solid())?;
        builder.register(
            WATER,
            "water",
            &[properties.level.erased()],
            Water {
                level: properties.level.clone(),
            },
        )?;
        builder.register(GLASS, "glass", &[], BasicBlock::transparent())?;
        builder.register(
            TORCH,
            "torch",
            &[facing.clone()],
            Torch {
                facing: properties.facing.clone(),
            },
        )?;
        builder.register(
            CHEST,
            "chest",
            &[facing],
            Chest {
                facing: properties.facing.clone(),
            },
        )?;
        let registry = builder.build()?;

        let state = |name: &str| -> Result<BlockState> {
            registry
                .block_by_name(name)
                .map(|block| block.default_state().handle())
                .with_context(|| format!("block {name} missing after registration"))
        };
        Ok(Self {
            air: state("air")?,
            stone: state("stone")?,
            grass: state("grass")?,
            dirt: state("dirt")?,
            sapling: state("sapling")?,
            bedrock: state("bedrock")?,
            water: state("water")?,
            glass: state("glass")?,
            torch: state("torch")?,
            chest: state("chest")?,
            properties,
            registry,
        })
    }

    /// `base` with `facing` set, for torches and chests.
    pub fn facing(&self, base: BlockState, facing: Facing) -> Result<BlockState> {
        let state = self.registry.state(base).with(&self.properties.facing, facing)?;
        Ok(state.handle())
    }
}

/// Legacy torch metadata for the four wall directions.
const fn torch_metadata(facing: Facing) -> u8 {
    match facing {
        Facing::East => 1,
        Facing::West => 2,
        Facing::South => 3,
        Facing::North => 4,
        Facing::Up | Facing::Down => 5,
    }
}

/// Legacy metadata for blocks placed against a horizontal face.
const fn horizontal_metadata(facing: Facing) -> u8 {
    match facing {
        Facing::North => 2,
        Facing::South => 3,
        Facing::West => 4,
        Facing::East => 5,
        Facing::Up | Facing::Down => 2,
    }
}

fn facing_from<'r>(
    property: &Property<Facing>,
    default: StateRef<'r>,
    metadata: u8,
    encode: fn(Facing) -> u8,
) -> Option<StateRef<'r>> {
    let facing = Facing::HORIZONTAL
        .into_iter()
        .find(|&facing| encode(facing) == metadata);
    match facing {
        Some(facing) => default.with(property, facing).ok(),
        None => Some(default),
    }
}

struct Torch {
    facing: Property<Facing>,
}

impl Block for Torch {
    fn light_opacity(&self, _state: StateRef<'_>) -> u8 {
        0
    }

    fn light_value(&self, _state: StateRef<'_>) -> u8 {
        14
    }

    fn blocks_precipitation(&self, _state: StateRef<'_>) -> bool {
        false
    }

    fn metadata_from_state(&self, state: StateRef<'_>) -> u8 {
        state.value(&self.facing).map_or(5, torch_metadata)
    }

    fn state_from_metadata<'r>(&self, default: StateRef<'r>, metadata: u8) -> Option<StateRef<'r>> {
        facing_from(&self.facing, default, metadata, torch_metadata)
    }
}

struct Water {
    level: Property<i32>,
}

impl Block for Water {
    fn light_opacity(&self, _state: StateRef<'_>) -> u8 {
        3
    }

    fn metadata_from_state(&self, state: StateRef<'_>) -> u8 {
        state.value(&self.level).map_or(0, |level| level as u8)
    }

    fn state_from_metadata<'r>(&self, default: StateRef<'r>, metadata: u8) -> Option<StateRef<'r>> {
        default.with(&self.level, metadata as i32).ok()
    }
}

struct Sapling {
    stage: Property<i32>,
}

impl Block for Sapling {
    fn light_opacity(&self, _state: StateRef<'_>) -> u8 {
        0
    }

    fn is_tickable(&self, _state: StateRef<'_>) -> bool {
        true
    }

    fn blocks_precipitation(&self, _state: StateRef<'_>) -> bool {
        false
    }

    fn metadata_from_state(&self, state: StateRef<'_>) -> u8 {
        state.value(&self.stage).map_or(0, |stage| (stage as u8) << 3)
    }

    fn state_from_metadata<'r>(&self, default: StateRef<'r>, metadata: u8) -> Option<StateRef<'r>> {
        default.with(&self.stage, ((metadata & 0x8) >> 3) as i32).ok()
    }
}

struct Chest {
    facing: Property<Facing>,
}

impl Block for Chest {
    fn light_opacity(&self, _state: StateRef<'_>) -> u8 {
        0
    }

    fn metadata_from_state(&self, state: StateRef<'_>) -> u8 {
        state.value(&self.facing).map_or(2, horizontal_metadata)
    }

    fn state_from_metadata<'r>(&self, default: StateRef<'r>, metadata: u8) -> Option<StateRef<'r>> {
        facing_from(&self.facing, default, metadata, horizontal_metadata)
    }

    fn provides_tile_entity(&self) -> bool {
        true
    }

    fn create_tile_entity(&self, _state: StateRef<'_>) -> Option<Box<dyn TileEntity>> {
        Some(Box::new(ChestTile::default()))
    }
}

/// Slots of a single chest.
pub const CHEST_SLOTS: usize = 27;

/// Chest contents, as `(dense item id, count)` per slot.
#[derive(Debug, Default)]
pub struct ChestTile {
    invalid: bool,
    pub slots: [Option<(u16, u8)>; CHEST_SLOTS],
    /// Facing seen the last time the chest looked at its block.
    pub cached_facing: Option<Facing>,
}

impl TileEntity for ChestTile {
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
        self.cached_facing = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
