use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;

use super::detached::DetachedState;
use super::property::{Property, PropertyValue};
use super::table::StateTable;
use super::BlockState;
use crate::error::StateError;
use crate::registry::index::DenseStateId;
use crate::registry::{BlockEntry, BlockId, BlockRef, BlockRegistry};

/// Property access shared by interned and detached states.
pub trait StateView: Sized {
    fn block_id(&self) -> BlockId;

    /// Current value of `property`.
    fn value<T: PropertyValue>(&self, property: &Property<T>) -> Result<T, StateError>;

    /// The state with `property` set to `value` and everything else unchanged.
    ///
    /// Returns an equal state when `value` is already current. Fails when the
    /// block does not declare `property` or `value` is outside its domain.
    fn with<T: PropertyValue>(&self, property: &Property<T>, value: T) -> Result<Self, StateError>;

    /// Advance `property` to the next value of its domain, wrapping.
    fn cycle<T: PropertyValue>(&self, property: &Property<T>) -> Result<Self, StateError> {
        let current = self.value(property)?;
        let next = property
            .next_after(current)
            .ok_or_else(|| property.disallowed(current))?;
        self.with(property, next)
    }
}

/// Borrowed view of an interned [`BlockState`].
///
/// Equality is identity: same registry, same arena slot.
#[derive(Clone, Copy)]
pub struct StateRef<'r> {
    registry: &'r BlockRegistry,
    state: BlockState,
}

impl<'r> StateRef<'r> {
    pub(crate) fn new(registry: &'r BlockRegistry, state: BlockState) -> Self {
        Self { registry, state }
    }

    pub fn handle(self) -> BlockState {
        self.state
    }

    pub fn registry(self) -> &'r BlockRegistry {
        self.registry
    }

    fn entry(self) -> &'r BlockEntry {
        self.registry.entry_of(self.state).0
    }

    /// Index of this state inside its block's table.
    pub fn local_index(self) -> usize {
        self.registry.entry_of(self.state).1
    }

    pub fn block(self) -> BlockRef<'r> {
        BlockRef::new(self.registry, self.entry())
    }

    pub fn block_name(self) -> &'r str {
        self.entry().table.block_name()
    }

    pub fn table(self) -> &'r StateTable {
        &self.entry().table
    }

    pub fn default_state(self) -> StateRef<'r> {
        Self::new(self.registry, BlockState(self.entry().first_state))
    }

    /// The sibling at local `index`, if the block has that many states.
    pub fn variant(self, index: usize) -> Option<StateRef<'r>> {
        let entry = self.entry();
        (index < entry.table.len())
            .then(|| Self::new(self.registry, BlockState(entry.first_state + index as u32)))
    }

    /// `(property name, value name)` pairs in declaration order.
    pub fn properties(self) -> impl Iterator<Item = (&'r str, Cow<'static, str>)> + 'r {
        let table = self.table();
        let combination = table.combination(self.local_index());
        table
            .properties()
            .iter()
            .zip(combination)
            .map(|(property, &value)| {
                (
                    property.name(),
                    property.value_name(value as usize).unwrap_or(Cow::Borrowed("?")),
                )
            })
    }

    /// Copy this state's mapping into a non-interned state.
    pub fn detach(self) -> DetachedState {
        let table = self.table();
        DetachedState::from_parts(
            self.block_id(),
            table.block_name().into(),
            table.shared_properties(),
            table.combination(self.local_index()).into(),
        )
    }

    pub fn dense_id(self) -> DenseStateId {
        self.registry.dense_id(self.state)
    }

    pub fn is_air(self) -> bool {
        self.entry().behavior.is_air(self)
    }

    pub fn light_opacity(self) -> u8 {
        self.entry().behavior.light_opacity(self)
    }

    pub fn light_value(self) -> u8 {
        self.entry().behavior.light_value(self)
    }

    pub fn is_tickable(self) -> bool {
        self.entry().behavior.is_tickable(self)
    }

    fn slot<T: PropertyValue>(self, property: &Property<T>) -> Result<usize, StateError> {
        self.table()
            .slot_of(property.key())
            .ok_or_else(|| StateError::UnknownProperty {
                block: self.block_name().to_string(),
                property: property.name().to_string(),
            })
    }
}

impl StateView for StateRef<'_> {
    fn block_id(&self) -> BlockId {
        self.entry().id
    }

    fn value<T: PropertyValue>(&self, property: &Property<T>) -> Result<T, StateError> {
        let slot = self.slot(property)?;
        let index = self.table().value_index(self.local_index(), slot);
        property
            .value_at(index)
            .ok_or_else(|| StateError::LayoutMismatch(self.block_name().to_string()))
    }

    fn with<T: PropertyValue>(&self, property: &Property<T>, value: T) -> Result<Self, StateError> {
        let slot = self.slot(property)?;
        let index = property.index_of(value).ok_or_else(|| property.disallowed(value))?;
        let sibling = self.table().transition(self.local_index(), slot, index)?;
        Ok(Self::new(
            self.registry,
            BlockState(self.entry().first_state + sibling as u32),
        ))
    }
}

impl PartialEq for StateRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.registry, other.registry) && self.state == other.state
    }
}

impl Eq for StateRef<'_> {}

impl Hash for StateRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash(state);
    }
}

impl From<StateRef<'_>> for BlockState {
    fn from(view: StateRef<'_>) -> Self {
        view.state
    }
}

impl fmt::Display for StateRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.block_name())?;
        let mut properties = self.properties().peekable();
        if properties.peek().is_some() {
            f.write_str("[")?;
            for (i, (name, value)) in properties.enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{name}={value}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StateRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateRef({self} #{})", self.state.0)
    }
}
