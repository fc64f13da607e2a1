use std::collections::HashMap;
use std::sync::Arc;

use super::property::{ErasedProperty, PropertyKey};
use crate::error::StateError;

/// Upper bound on the states one block may generate.
pub const MAX_STATES_PER_BLOCK: usize = 1 << 16;

/// Sentinel for a transition slot with no sibling.
const NO_SIBLING: u32 = u32::MAX;

/// Every property combination of one block, plus the transition table that
/// maps `(state, property, value)` to the sibling state.
///
/// States are addressed by their local index. Combinations are enumerated in
/// mixed radix with the last property varying fastest, so index 0 holds every
/// property at its first value and is the block's default state.
#[derive(Debug)]
pub struct StateTable {
    block_name: String,
    properties: Arc<[ErasedProperty]>,
    strides: Box<[usize]>,
    /// Per property, offset of its value run inside a transition row.
    row_offsets: Box<[usize]>,
    row_len: usize,
    /// `state_count * properties.len()` domain indices.
    values: Box<[u16]>,
    state_count: usize,
    /// Combination -> state, only alive between generation and transition build.
    pending: Option<HashMap<Box<[u16]>, u32>>,
    transitions: Option<Box<[u32]>>,
}

impl StateTable {
    /// Enumerate the cartesian product of `properties`.
    pub fn generate(block_name: &str, properties: &[ErasedProperty]) -> Result<Self, StateError> {
        for (i, property) in properties.iter().enumerate() {
            if properties[..i].iter().any(|p| p.name() == property.name()) {
                return Err(StateError::DuplicateProperty {
                    block: block_name.to_string(),
                    property: property.name().to_string(),
                });
            }
        }

        let mut state_count = 1usize;
        for property in properties {
            state_count = state_count
                .checked_mul(property.len())
                .filter(|&n| n <= MAX_STATES_PER_BLOCK)
                .ok_or_else(|| StateError::TooManyStates {
                    block: block_name.to_string(),
                    count: properties.iter().map(|p| p.len()).product(),
                    limit: MAX_STATES_PER_BLOCK,
                })?;
        }

        let mut strides = vec![1usize; properties.len()];
        for i in (0..properties.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * properties[i + 1].len();
        }

        let mut row_offsets = Vec::with_capacity(properties.len());
        let mut row_len = 0;
        for property in properties {
            row_offsets.push(row_len);
            row_len += property.len();
        }

        let width = properties.len();
        let mut values = Vec::with_capacity(state_count * width);
        let mut pending = HashMap::with_capacity(state_count);
        for state in 0..state_count {
            let combination: Box<[u16]> = properties
                .iter()
                .zip(&strides)
                .map(|(property, stride)| ((state / stride) % property.len()) as u16)
                .collect();
            values.extend_from_slice(&combination);
            pending.insert(combination, state as u32);
        }

        Ok(Self {
            block_name: block_name.to_string(),
            properties: properties.into(),
            strides: strides.into_boxed_slice(),
            row_offsets: row_offsets.into_boxed_slice(),
            row_len,
            values: values.into_boxed_slice(),
            state_count,
            pending: Some(pending),
            transitions: None,
        })
    }

    /// Precompute every single-property transition. May only run once.
    pub fn build_transitions(&mut self) -> Result<(), StateError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| StateError::TransitionsAlreadyBuilt(self.block_name.clone()))?;

        let width = self.properties.len();
        let mut table = vec![NO_SIBLING; self.state_count * self.row_len];
        let mut probe = vec![0u16; width];
        for state in 0..self.state_count {
            let combination = &self.values[state * width..(state + 1) * width];
            let row = state * self.row_len;
            for (slot, property) in self.properties.iter().enumerate() {
                for value in 0..property.len() {
                    let target = if combination[slot] as usize == value {
                        state as u32
                    } else {
                        probe.copy_from_slice(combination);
                        probe[slot] = value as u16;
                        match pending.get(probe.as_slice()) {
                            Some(&sibling) => sibling,
                            None => continue,
                        }
                    };
                    table[row + self.row_offsets[slot] + value] = target;
                }
            }
        }

        self.transitions = Some(table.into_boxed_slice());
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.transitions.is_some()
    }

    pub fn block_name(&self) -> &str {
        &self.block_name
    }

    pub fn properties(&self) -> &[ErasedProperty] {
        &self.properties
    }

    pub(crate) fn shared_properties(&self) -> Arc<[ErasedProperty]> {
        Arc::clone(&self.properties)
    }

    pub fn len(&self) -> usize {
        self.state_count
    }

    pub fn is_empty(&self) -> bool {
        self.state_count == 0
    }

    /// Position of `key` in this block's property list.
    pub fn slot_of(&self, key: PropertyKey) -> Option<usize> {
        self.properties.iter().position(|p| p.key() == key)
    }

    /// Domain indices of every property for `state`.
    pub fn combination(&self, state: usize) -> &[u16] {
        let width = self.properties.len();
        &self.values[state * width..(state + 1) * width]
    }

    pub fn value_index(&self, state: usize, slot: usize) -> usize {
        self.combination(state)[slot] as usize
    }

    /// Local index of the state holding exactly `combination`.
    pub fn index_of(&self, combination: &[u16]) -> Option<usize> {
        if combination.len() != self.properties.len() {
            return None;
        }
        let mut index = 0;
        for ((&value, property), stride) in combination.iter().zip(self.properties.iter()).zip(&self.strides) {
            if value as usize >= property.len() {
                return None;
            }
            index += value as usize * stride;
        }
        Some(index)
    }

    /// Sibling of `state` with property `slot` set to domain index `value`.
    pub fn transition(&self, state: usize, slot: usize, value: usize) -> Result<usize, StateError> {
        let transitions = self
            .transitions
            .as_ref()
            .ok_or_else(|| StateError::TransitionsNotBuilt(self.block_name.clone()))?;
        let property = &self.properties[slot];
        let disallowed = || StateError::DisallowedValue {
            property: property.name().to_string(),
            value: value.to_string(),
        };
        if value >= property.len() {
            return Err(disallowed());
        }
        match transitions[state * self.row_len + self.row_offsets[slot] + value] {
            NO_SIBLING => Err(disallowed()),
            sibling => Ok(sibling as usize),
        }
    }
}
