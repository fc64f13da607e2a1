use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::property::{ErasedProperty, Property, PropertyValue};
use super::view::StateView;
use crate::error::StateError;
use crate::registry::BlockId;

/// A block state that owns its property mapping instead of pointing into a
/// state table.
///
/// Every [`StateView::with`] that changes a value allocates a new mapping.
/// Useful where the combination space is not enumerated up front: palette
/// decoding, command parsing, or staging a state before
/// [`crate::registry::BlockRegistry::intern`]. Equality is structural.
#[derive(Clone)]
pub struct DetachedState {
    block: BlockId,
    block_name: Arc<str>,
    properties: Arc<[ErasedProperty]>,
    values: Arc<[u16]>,
}

impl DetachedState {
    /// Every property at the first value of its domain.
    pub fn new(
        block: BlockId,
        block_name: impl Into<Arc<str>>,
        properties: impl Into<Arc<[ErasedProperty]>>,
    ) -> Self {
        let properties = properties.into();
        let values = vec![0u16; properties.len()].into();
        Self {
            block,
            block_name: block_name.into(),
            properties,
            values,
        }
    }

    pub(crate) fn from_parts(
        block: BlockId,
        block_name: Arc<str>,
        properties: Arc<[ErasedProperty]>,
        values: Arc<[u16]>,
    ) -> Self {
        Self {
            block,
            block_name,
            properties,
            values,
        }
    }

    pub fn block_name(&self) -> &str {
        &self.block_name
    }

    pub fn properties(&self) -> &[ErasedProperty] {
        &self.properties
    }

    /// Domain index of every property, in declaration order.
    pub fn combination(&self) -> &[u16] {
        &self.values
    }

    /// Set a property by its serialized names, e.g. `("facing", "east")`.
    pub fn with_named(&self, property: &str, value: &str) -> Result<Self, StateError> {
        let slot = self
            .properties
            .iter()
            .position(|p| p.name() == property)
            .ok_or_else(|| self.unknown(property))?;
        let index = self.properties[slot]
            .index_of_name(value)
            .ok_or_else(|| StateError::DisallowedValue {
                property: property.to_string(),
                value: value.to_string(),
            })?;
        Ok(self.replaced(slot, index as u16))
    }

    fn replaced(&self, slot: usize, index: u16) -> Self {
        if self.values[slot] == index {
            return self.clone();
        }
        let mut values = self.values.to_vec();
        values[slot] = index;
        Self {
            values: values.into(),
            ..self.clone()
        }
    }

    fn unknown(&self, property: &str) -> StateError {
        StateError::UnknownProperty {
            block: self.block_name.to_string(),
            property: property.to_string(),
        }
    }

    fn slot<T: PropertyValue>(&self, property: &Property<T>) -> Result<usize, StateError> {
        self.properties
            .iter()
            .position(|p| p.key() == property.key())
            .ok_or_else(|| self.unknown(property.name()))
    }
}

impl StateView for DetachedState {
    fn block_id(&self) -> BlockId {
        self.block
    }

    fn value<T: PropertyValue>(&self, property: &Property<T>) -> Result<T, StateError> {
        let slot = self.slot(property)?;
        property
            .value_at(self.values[slot] as usize)
            .ok_or_else(|| StateError::LayoutMismatch(self.block_name.to_string()))
    }

    fn with<T: PropertyValue>(&self, property: &Property<T>, value: T) -> Result<Self, StateError> {
        let slot = self.slot(property)?;
        let index = property.index_of(value).ok_or_else(|| property.disallowed(value))?;
        Ok(self.replaced(slot, index as u16))
    }
}

impl PartialEq for DetachedState {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block
            && self.values == other.values
            && self.properties.len() == other.properties.len()
            && self
                .properties
                .iter()
                .zip(other.properties.iter())
                .all(|(a, b)| a.key() == b.key())
    }
}

impl Eq for DetachedState {}

impl Hash for DetachedState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.block.hash(state);
        self.values.hash(state);
    }
}

impl fmt::Debug for DetachedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DetachedState({}", self.block_name)?;
        for (property, &value) in self.properties.iter().zip(self.values.iter()) {
            let name = property.value_name(value as usize).unwrap_or_default();
            write!(f, " {}={}", property.name(), name)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::property::Facing;

    fn torch() -> (Property<Facing>, DetachedState) {
        let facing = Property::new("facing", Facing::HORIZONTAL).unwrap();
        let state = DetachedState::new(BlockId(50), "torch", vec![facing.erased()]);
        (facing, state)
    }

    #[test]
    fn with_allocates_new_mapping() {
        let (facing, state) = torch();
        assert_eq!(state.value(&facing), Ok(Facing::North));
        let east = state.with(&facing, Facing::East).unwrap();
        assert_eq!(east.value(&facing), Ok(Facing::East));
        assert_eq!(state.value(&facing), Ok(Facing::North));
        assert!(!Arc::ptr_eq(&state.values, &east.values));
        assert_eq!(east.with(&facing, Facing::North).unwrap(), state);
    }

    #[test]
    fn unchanged_value_shares_mapping() {
        let (facing, state) = torch();
        let same = state.with(&facing, Facing::North).unwrap();
        assert!(Arc::ptr_eq(&state.values, &same.values));
    }

    #[test]
    fn contract_violations() {
        let (facing, state) = torch();
        assert!(matches!(
            state.with(&facing, Facing::Up),
            Err(StateError::DisallowedValue { .. })
        ));
        let lit = Property::boolean("lit");
        assert!(matches!(
            state.with(&lit, true),
            Err(StateError::UnknownProperty { .. })
        ));
        assert!(state.with_named("facing", "up").is_err());
        assert!(state.with_named("lit", "true").is_err());
    }

    #[test]
    fn cycle_wraps_through_domain() {
        let (facing, state) = torch();
        let mut current = state.clone();
        let mut seen = Vec::new();
        for _ in 0..4 {
            current = current.cycle(&facing).unwrap();
            seen.push(current.value(&facing).unwrap());
        }
        assert_eq!(seen, [Facing::South, Facing::West, Facing::East, Facing::North]);
        assert_eq!(current, state);
    }

    #[test]
    fn named_lookup() {
        let (facing, state) = torch();
        let west = state.with_named("facing", "west").unwrap();
        assert_eq!(west.value(&facing), Ok(Facing::West));
    }
}
