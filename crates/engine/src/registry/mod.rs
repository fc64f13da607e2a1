//! Block registration, state interning and dense id assignment.
//!
//! A [`RegistryBuilder`] collects blocks; [`RegistryBuilder::build`] freezes
//! them into an immutable [`BlockRegistry`] shared through `Arc`. Chunks and
//! sections hold that `Arc` explicitly: there is no global registry.

pub mod block;
pub mod index;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

pub use block::{BasicBlock, Block};
pub use index::{DenseStateId, GlobalStateIndex};

use crate::error::{RegistryError, StateError};
use crate::state::{BlockState, DetachedState, ErasedProperty, StateRef, StateTable};

/// Dense block id: the upper 12 bits of a [`DenseStateId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The default block; its default state fills absent sections.
    pub const DEFAULT: BlockId = BlockId(0);
    pub const MAX: u16 = 0x0FFF;

    pub const fn new(id: u16) -> Self {
        Self(id)
    }
}

pub(crate) struct BlockEntry {
    pub(crate) id: BlockId,
    pub(crate) behavior: Box<dyn Block>,
    pub(crate) table: StateTable,
    pub(crate) first_state: u32,
}

#[derive(Debug, Clone, Copy)]
struct StateSlot {
    entry: u32,
    local: u32,
}

/// Immutable set of registered blocks and their interned states.
pub struct BlockRegistry {
    entries: IndexMap<String, BlockEntry>,
    arena: Vec<StateSlot>,
    index: GlobalStateIndex,
    default_state: BlockState,
}

impl BlockRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Default state of block 0 ("air"): what absent sections contain.
    pub fn default_state(&self) -> BlockState {
        self.default_state
    }

    pub fn state(&self, state: BlockState) -> StateRef<'_> {
        StateRef::new(self, state)
    }

    pub(crate) fn entry_of(&self, state: BlockState) -> (&BlockEntry, usize) {
        let slot = self.arena[state.0 as usize];
        (&self.entries[slot.entry as usize], slot.local as usize)
    }

    fn entry_by_id(&self, id: BlockId) -> Option<&BlockEntry> {
        let entry = self.index.segment(DenseStateId::new(id, 0))?;
        Some(&self.entries[entry as usize])
    }

    pub fn block(&self, id: BlockId) -> Option<BlockRef<'_>> {
        self.entry_by_id(id).map(|entry| BlockRef::new(self, entry))
    }

    pub fn block_by_name(&self, name: &str) -> Option<BlockRef<'_>> {
        self.entries.get(name).map(|entry| BlockRef::new(self, entry))
    }

    /// Registered blocks in registration order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockRef<'_>> {
        self.entries.values().map(|entry| BlockRef::new(self, entry))
    }

    pub fn block_count(&self) -> usize {
        self.entries.len()
    }

    pub fn state_count(&self) -> usize {
        self.arena.len()
    }

    pub fn index(&self) -> &GlobalStateIndex {
        &self.index
    }

    pub fn dense_id(&self, state: BlockState) -> DenseStateId {
        self.index.dense_id(state)
    }

    /// Decode `id`, or `None` if its block is unregistered or the block
    /// cannot interpret its metadata.
    pub fn resolve(&self, id: DenseStateId) -> Option<BlockState> {
        let entry = &self.entries[self.index.segment(id)? as usize];
        let default = StateRef::new(self, BlockState(entry.first_state));
        let state = entry.behavior.state_from_metadata(default, id.metadata())?;
        Some(state.handle())
    }

    /// Decode `id`, falling back to `default`. Never fails: ids from persisted
    /// data may reference content that is no longer registered.
    pub fn state_by_id(&self, id: DenseStateId, default: BlockState) -> BlockState {
        self.resolve(id).unwrap_or(default)
    }

    /// Bits needed per stored id (at least 4).
    pub fn state_bits(&self) -> u8 {
        let max = self.index.max_id().0;
        ((u16::BITS - max.leading_zeros()) as u8).max(4)
    }

    /// Canonical interned state with the same mapping as `detached`.
    pub fn intern(&self, detached: &DetachedState) -> Result<BlockState, StateError> {
        use crate::state::StateView;

        let entry = self
            .entry_by_id(detached.block_id())
            .ok_or_else(|| StateError::LayoutMismatch(detached.block_name().to_string()))?;
        let same_layout = entry.table.properties().len() == detached.properties().len()
            && entry
                .table
                .properties()
                .iter()
                .zip(detached.properties())
                .all(|(a, b)| a.key() == b.key());
        if !same_layout {
            return Err(StateError::LayoutMismatch(entry.table.block_name().to_string()));
        }
        let local = entry
            .table
            .index_of(detached.combination())
            .ok_or_else(|| StateError::LayoutMismatch(entry.table.block_name().to_string()))?;
        Ok(BlockState(entry.first_state + local as u32))
    }

    pub fn block_of(&self, state: BlockState) -> BlockId {
        self.entry_of(state).0.id
    }

    pub fn is_air(&self, state: BlockState) -> bool {
        self.state(state).is_air()
    }

    pub fn light_opacity(&self, state: BlockState) -> u8 {
        self.state(state).light_opacity()
    }

    pub fn light_value(&self, state: BlockState) -> u8 {
        self.state(state).light_value()
    }

    pub fn is_tickable(&self, state: BlockState) -> bool {
        self.state(state).is_tickable()
    }

    pub fn blocks_precipitation(&self, state: BlockState) -> bool {
        let view = self.state(state);
        self.entry_of(state).0.behavior.blocks_precipitation(view)
    }

    pub fn provides_tile_entity(&self, id: BlockId) -> bool {
        self.entry_by_id(id)
            .is_some_and(|entry| entry.behavior.provides_tile_entity())
    }
}

impl fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("blocks", &self.entries.len())
            .field("states", &self.arena.len())
            .finish()
    }
}

/// Borrowed view of one registered block.
#[derive(Clone, Copy)]
pub struct BlockRef<'r> {
    registry: &'r BlockRegistry,
    entry: &'r BlockEntry,
}

impl<'r> BlockRef<'r> {
    pub(crate) fn new(registry: &'r BlockRegistry, entry: &'r BlockEntry) -> Self {
        Self { registry, entry }
    }

    pub fn id(self) -> BlockId {
        self.entry.id
    }

    pub fn name(self) -> &'r str {
        self.entry.table.block_name()
    }

    pub fn table(self) -> &'r StateTable {
        &self.entry.table
    }

    pub fn behavior(self) -> &'r dyn Block {
        self.entry.behavior.as_ref()
    }

    pub fn default_state(self) -> StateRef<'r> {
        StateRef::new(self.registry, BlockState(self.entry.first_state))
    }

    /// Every state of this block, in table order.
    pub fn states(self) -> impl Iterator<Item = StateRef<'r>> {
        let first = self.entry.first_state;
        let registry = self.registry;
        (0..self.entry.table.len() as u32).map(move |i| StateRef::new(registry, BlockState(first + i)))
    }
}

impl fmt::Debug for BlockRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockRef({} #{})", self.name(), self.id().0)
    }
}

/// Collects block registrations.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: IndexMap<String, BlockEntry>,
    next_state: u32,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `behavior` under dense block id `id`, generating every
    /// combination of `properties` and its transition table.
    pub fn register(
        &mut self,
        id: u16,
        name: impl Into<String>,
        properties: &[ErasedProperty],
        behavior: impl Block,
    ) -> Result<BlockId, RegistryError> {
        let name = name.into();
        if id > BlockId::MAX {
            return Err(RegistryError::IdOutOfRange(id));
        }
        if self.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        if self.entries.values().any(|entry| entry.id.0 == id) {
            return Err(RegistryError::DuplicateId(id));
        }

        let mut table = StateTable::generate(&name, properties)?;
        table.build_transitions()?;

        let first_state = self.next_state;
        self.next_state += table.len() as u32;
        tracing::debug!(block = %name, id, states = table.len(), "registered block");

        self.entries.insert(
            name,
            BlockEntry {
                id: BlockId(id),
                behavior: Box::new(behavior),
                table,
                first_state,
            },
        );
        Ok(BlockId(id))
    }

    /// Freeze the registrations and assign dense ids.
    pub fn build(self) -> Result<Arc<BlockRegistry>, RegistryError> {
        let Some(default_entry) = self.entries.values().find(|e| e.id == BlockId::DEFAULT) else {
            return Err(RegistryError::MissingDefault);
        };
        let default_state = BlockState(default_entry.first_state);

        let mut arena = Vec::with_capacity(self.next_state as usize);
        for (entry_index, entry) in self.entries.values().enumerate() {
            for local in 0..entry.table.len() as u32 {
                arena.push(StateSlot {
                    entry: entry_index as u32,
                    local,
                });
            }
        }

        let mut registry = BlockRegistry {
            entries: self.entries,
            arena,
            index: GlobalStateIndex::new(),
            default_state,
        };

        let metadata: Vec<(BlockId, Vec<u8>)> = registry
            .entries
            .values()
            .map(|entry| {
                let metas = (0..entry.table.len() as u32)
                    .map(|local| {
                        let view = StateRef::new(&registry, BlockState(entry.first_state + local));
                        entry.behavior.metadata_from_state(view) & 0x0F
                    })
                    .collect();
                (entry.id, metas)
            })
            .collect();
        for (entry_index, (id, metas)) in metadata.into_iter().enumerate() {
            registry.index.register(id, entry_index as u32, &metas);
        }

        tracing::debug!(
            blocks = registry.entries.len(),
            states = registry.arena.len(),
            bits = registry.state_bits(),
            "block registry built"
        );
        Ok(Arc::new(registry))
    }
}
